//! Device bridges used by the CLI.

pub mod adb;
pub mod file;

pub use adb::AdbBridge;
pub use file::FileBridge;
