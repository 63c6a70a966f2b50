//! DU manager UE procedures

mod ue_configuration;
mod ue_creation;
mod ue_deletion;

pub use ue_configuration::UeConfigurationProcedure;
pub use ue_creation::UeCreationProcedure;
pub use ue_deletion::UeDeletionProcedure;
