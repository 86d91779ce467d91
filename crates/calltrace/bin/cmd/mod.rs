pub mod contract;
pub mod replay;
