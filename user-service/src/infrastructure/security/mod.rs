//! 密码摘要、JWT 访问令牌与流媒体 API Key 的实现

pub mod api_key;
pub mod jwt;
pub mod password;

pub use api_key::HmacApiKeySigner;
pub use jwt::JwtTokenCodec;
pub use password::Sha256PasswordHasher;
