//! 展台扫码激活
//!
//! 通过扫描展台二维码中的设备指纹，把物理设备绑定到账号下的某个展台，
//! 并在绑定前检测订阅缺失、指纹已绑定其他展台、目标展台残留其他设备数据
//! 这三类冲突。

pub mod api;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod resolver;
pub mod session;
pub mod store;

pub use api::{ApiClient, BoothApi};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use fingerprint::{validate, Fingerprint};
pub use session::{ActivationContext, ScanSession, SessionError, SessionHandle, SessionState};
