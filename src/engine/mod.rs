pub mod booking;
pub mod matching;
pub mod recommend;
