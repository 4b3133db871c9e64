//! Build script for fanctl-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml and turns it into constants

use std::env;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::PathBuf;

fn main() {
    setup_linker();
    generate_board();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Abort the build with a boxed error report
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Collects values and problems while walking board.toml
struct Board {
    value: toml::Value,
    errors: Vec<String>,
}

impl Board {
    fn get(&self, section: &str, key: &str) -> Option<&toml::Value> {
        self.value.get(section).and_then(|s| s.get(key))
    }

    fn int(&mut self, section: &str, key: &str, range: RangeInclusive<i64>) -> i64 {
        match self.get(section, key) {
            Some(toml::Value::Integer(v)) if range.contains(v) => *v,
            Some(toml::Value::Integer(v)) => {
                self.errors.push(format!(
                    "[{}] {} = {:#x} outside {:#x}..={:#x}",
                    section,
                    key,
                    v,
                    range.start(),
                    range.end()
                ));
                *range.start()
            }
            Some(_) => {
                self.errors.push(format!("[{}] {} must be an integer", section, key));
                *range.start()
            }
            None => {
                self.errors.push(format!("[{}] missing '{}'", section, key));
                *range.start()
            }
        }
    }

    fn floats(&mut self, section: &str, key: &str, count: usize) -> Vec<f64> {
        let values: Option<Vec<f64>> = match self.get(section, key) {
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    toml::Value::Float(f) => Some(*f),
                    toml::Value::Integer(i) => Some(*i as f64),
                    _ => None,
                })
                .collect(),
            _ => None,
        };
        match values {
            Some(v) if v.len() == count && v.iter().all(|x| *x > 0.0) => v,
            _ => {
                self.errors.push(format!(
                    "[{}] {} must be {} positive numbers",
                    section, key, count
                ));
                vec![1.0; count]
            }
        }
    }
}

fn generate_board() {
    println!("cargo:rerun-if-changed=board.toml");

    let content = fs::read_to_string("board.toml")
        .unwrap_or_else(|e| fail("Failed to read board.toml", &[e.to_string()]));
    let value: toml::Value = toml::from_str(&content).unwrap_or_else(|e| {
        let lines: Vec<String> = e.to_string().lines().map(str::to_string).collect();
        fail("Invalid TOML syntax in board.toml", &lines)
    });

    let mut board = Board {
        value,
        errors: Vec::new(),
    };

    let spi_hz = board.int("flash", "spi_hz", 1_000..=62_500_000);
    let fs_offset = board.int("storage", "offset", 0..=0x00FF_F000);
    let fs_size = board.int("storage", "size", 0x2000..=0x0100_0000);
    if fs_offset % 4096 != 0 || fs_size % 4096 != 0 {
        board
            .errors
            .push("[storage] offset and size must be 4 KiB aligned".to_string());
    }
    if fs_offset + fs_size > 0x0100_0000 {
        board
            .errors
            .push("[storage] range must end within 16 MiB".to_string());
    }

    let i2c_hz = board.int("i2c", "frequency_hz", 10_000..=1_000_000);
    let mux_address = board.int("mux", "address", 0x70..=0x77);
    let tmp117_address = board.int("tmp117", "address", 0x48..=0x4B);
    let tmp117_channel = board.int("tmp117", "channel", 0..=3);
    let ina3221_address = board.int("ina3221", "address", 0x40..=0x43);
    let ina3221_channel = board.int("ina3221", "channel", 0..=3);
    let shunts = board.floats("ina3221", "shunt_ohms", 3);
    let period_ms = board.int("sensors", "period_ms", 10..=3_600_000);

    let identity = if board.value.get("identity").is_some() {
        let words: Vec<i64> = ["vendor_id", "product_id", "revision", "serial"]
            .iter()
            .map(|key| board.int("identity", key, 0..=u32::MAX as i64))
            .collect();
        Some(words)
    } else {
        None
    };

    if !board.errors.is_empty() {
        fail("Invalid board.toml", &board.errors);
    }

    let mut out = String::new();
    writeln!(out, "// Generated from board.toml by build.rs").unwrap();
    writeln!(out, "pub const FLASH_SPI_HZ: u32 = {};", spi_hz).unwrap();
    writeln!(out, "pub const FS_OFFSET: u32 = {:#x};", fs_offset).unwrap();
    writeln!(out, "pub const FS_SIZE: u32 = {:#x};", fs_size).unwrap();
    writeln!(out, "pub const I2C_HZ: u32 = {};", i2c_hz).unwrap();
    writeln!(out, "pub const MUX_ADDRESS: u8 = {:#x};", mux_address).unwrap();
    writeln!(out, "pub const TMP117_ADDRESS: u8 = {:#x};", tmp117_address).unwrap();
    writeln!(out, "pub const TMP117_CHANNEL: u8 = {};", tmp117_channel).unwrap();
    writeln!(out, "pub const INA3221_ADDRESS: u8 = {:#x};", ina3221_address).unwrap();
    writeln!(out, "pub const INA3221_CHANNEL: u8 = {};", ina3221_channel).unwrap();
    writeln!(
        out,
        "pub const SHUNT_OHMS: [f32; 3] = [{:?}, {:?}, {:?}];",
        shunts[0] as f32, shunts[1] as f32, shunts[2] as f32
    )
    .unwrap();
    writeln!(out, "pub const SENSOR_PERIOD_MS: u64 = {};", period_ms).unwrap();
    match identity {
        Some(w) => writeln!(
            out,
            "pub const DEFAULT_IDENTITY: Option<[u32; 4]> = Some([{:#x}, {:#x}, {:#x}, {:#x}]);",
            w[0], w[1], w[2], w[3]
        )
        .unwrap(),
        None => writeln!(out, "pub const DEFAULT_IDENTITY: Option<[u32; 4]> = None;").unwrap(),
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("board.rs"), out).unwrap();
}
