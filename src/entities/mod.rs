pub mod prelude;

pub mod submissions;
pub mod users;
