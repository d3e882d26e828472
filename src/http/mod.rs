pub mod parser;
pub mod request;
pub mod response;

pub use parser::{HttpParser, Limits as ParserLimits, MessageType, Method, ParserState, Token};
pub use request::HttpRequest;
pub use response::{error_response, HttpResponse};
