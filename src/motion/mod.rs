// src/motion/mod.rs - Motion generation for a single scalar degree of freedom
pub mod oracle;
pub mod path_oracle;
pub mod planner;
pub mod segments;
pub mod trajectory;
