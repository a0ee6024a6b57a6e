//! Motion and mechanism control core for a mecanum-drive competition robot
//!
//! Actuator ports hide the motor vendor, controllers turn intent into
//! demands, the sequencer runs autonomous routines and held-button groups one
//! tick at a time, and the runtime ties it to zenoh at 50 Hz.

pub mod actuator;
pub mod config;
pub mod drive;
pub mod mechanism;
pub mod messages;
pub mod robot;
pub mod routines;
pub mod runtime;
pub mod sequencer;
pub mod teleop;
