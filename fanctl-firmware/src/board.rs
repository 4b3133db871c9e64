//! Board wiring
//!
//! Bus speeds, addresses and the storage range come from `board.toml`.
//! Pin assignment is fixed by the PCB:
//!
//! | Signal        | GPIO |
//! |---------------|------|
//! | Flash SCK     | 18   |
//! | Flash MOSI    | 19   |
//! | Flash MISO    | 16   |
//! | Flash CS      | 17   |
//! | I2C SDA       | 4    |
//! | I2C SCL       | 5    |
//! | Mux reset     | 6    |
//! | Status LED    | 25   |

use fanctl_core::Identity;

include!(concat!(env!("OUT_DIR"), "/board.rs"));

/// Filesystem range on the external flash
pub const FS_RANGE: core::ops::Range<u32> = FS_OFFSET..FS_OFFSET + FS_SIZE;

/// Identity to provision when the board has none stored
pub fn default_identity() -> Option<Identity> {
    DEFAULT_IDENTITY.map(|[vendor_id, product_id, revision, serial]| Identity {
        vendor_id,
        product_id,
        revision,
        serial,
    })
}
