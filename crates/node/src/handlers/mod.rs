//! Request handlers, one module per action family
//!
//! Each handler validates against stored state, answers through
//! [`ContractActor::respond`](crate::actor::ContractActor), and commits only
//! once the response is out. Failures carrying a rejection code are turned
//! into Rejection responses by the dispatcher.

mod agreement;
mod asset;
mod contract;
mod enforcement;
mod governance;
