// Scoring pipeline stages, in evaluation order
pub mod features {
    pub use crate::features::*;
}

pub mod rules {
    pub use crate::rules::*;
}

pub mod classifier {
    pub use crate::classifier::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod pricing {
    pub use crate::pricing::*;
}

pub mod portfolio {
    pub use crate::portfolio::*;
}

pub mod loan {
    pub use crate::loan::*;
}

pub mod emi {
    pub use crate::emi::*;
}

pub mod statement {
    pub use crate::statement::*;
}
