pub mod walk_forward;

pub use walk_forward::{
    plan_windows, validate, AggregateMetrics, SideAggregate, ValidationResult, ValidationWindow,
    WalkForwardConfig, WalkForwardValidator, WindowBounds,
};
