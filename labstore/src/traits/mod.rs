mod connectivity;
mod local;
mod record;
mod remote;

pub use connectivity::*;
pub use local::*;
pub use record::*;
pub use remote::*;
