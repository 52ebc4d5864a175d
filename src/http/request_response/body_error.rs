use std::error::Error as StdError;

// Unified body error type for route responses.
//
// Buffered bodies never fail, streaming bodies supplied by route handlers may
// fail with whatever error their source produces.
pub type BodyError = Box<dyn StdError + Send + Sync>;
