pub mod openholidays;

pub use openholidays::OpenHolidaysClient;
