extern crate futures;
extern crate tokio;

pub mod drivers;
pub mod error;

pub mod gear {
    pub mod address;
    pub mod cmd_defs;
    pub mod commands;
}

pub mod utils {
    pub mod dyn_future;
}
