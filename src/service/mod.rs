//! Remote metadata service
//!
//! The pipeline only depends on the [`MetadataService`] trait. The SOAP
//! client is the production implementation; tests substitute scripted ones.

mod soap;
mod traits;

pub use soap::SoapMetadataClient;
pub use traits::MetadataService;
