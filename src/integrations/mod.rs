//! External service integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod statement_parser {
    pub use crate::statement_parser::*;
}

pub mod alternative_data {
    pub use crate::alternative_data::*;
}
