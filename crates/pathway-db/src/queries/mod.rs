pub mod canvases;
pub mod milestones;
pub mod plans;
