pub mod access;
pub mod accounts;
pub mod credentials;
pub mod reports;
pub mod storage;
pub mod submissions;
