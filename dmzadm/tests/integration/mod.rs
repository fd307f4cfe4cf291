// vim: tw=80
mod dmzadm;
mod util;

pub use util::dmzadm;
