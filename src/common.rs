mod ball_center;
mod ball_frame;
mod detector_config;
mod detector_kind;
mod estimate;
mod session_config;
mod simulator_config;
mod time_base;

pub use ball_center::*;
pub use ball_frame::*;
pub use detector_config::*;
pub use detector_kind::*;
pub use estimate::*;
pub use session_config::*;
pub use simulator_config::*;
pub use time_base::*;
