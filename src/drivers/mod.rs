pub mod driver;
pub mod driver_init;
pub use driver::driver_names;
pub use driver::open;
pub use driver_init::init;

pub mod driver_utils;
pub mod send_flags;
pub mod utils;

pub mod hasseb {
    pub mod codec;
    pub mod correlator;
    #[allow(clippy::module_inception)]
    pub mod hasseb;
    pub mod serial;
    pub mod settling;
    pub mod transport;
    #[cfg(feature = "hasseb_driver")]
    pub mod hid;
    #[cfg(test)]
    pub(crate) mod mock;

    pub use self::hasseb::{HassebConfig, HassebDriver};
}
