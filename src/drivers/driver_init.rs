use crate::drivers;
#[allow(unused_imports)] // In case no drivers are enabled
use drivers::driver::add_driver;
#[cfg(feature = "hasseb_driver")]
use drivers::hasseb::hasseb;

pub fn init() -> crate::error::DynResult<()> {
    #[cfg(feature = "hasseb_driver")]
    add_driver(hasseb::driver_info());
    Ok(())
}
