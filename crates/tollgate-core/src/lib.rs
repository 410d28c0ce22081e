pub mod error;
pub mod key_material;
pub mod record;
pub mod state_machine;
pub mod types;

pub use error::CoreError;
pub use key_material::KeyMaterial;
pub use record::{PaymentRecord, DEFAULT_PAYMENT_WINDOW_SECS};
pub use state_machine::{LifecycleEvent, PaymentLifecycle, PaymentStatus};
pub use types::{keccak256, Address, TxHash, Wei};
