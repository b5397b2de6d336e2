//! The association service seam: how the query model reaches the network

use dicom_object::InMemDicomObject;
use dimse::{MoveSummary, RemoteNode};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Connection parameters of the remote archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Remote host address
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Remote (called) application entity title
    pub called_ae_title: String,
    /// Local (calling) application entity title
    pub calling_ae_title: String,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        called_ae_title: impl Into<String>,
        calling_ae_title: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            called_ae_title: called_ae_title.into(),
            calling_ae_title: calling_ae_title.into(),
        }
    }

    /// The remote side as a DIMSE node
    pub fn remote_node(&self) -> RemoteNode {
        RemoteNode::new(self.called_ae_title.clone(), self.host.clone(), self.port)
    }

    pub fn validate(&self) -> Result<()> {
        self.remote_node().validate()?;
        dimse::config::validate_ae_title(&self.calling_ae_title)?;
        Ok(())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}@{}:{}",
            self.calling_ae_title, self.called_ae_title, self.host, self.port
        )
    }
}

/// Blocking access to query/retrieve associations.
///
/// Every call returns only when the remote exchange has completed or failed.
/// An association is opened for a single SOP class and may serve any number
/// of requests until it is released.
pub trait AssociationService {
    type Association;

    /// Open an association proposing `sop_class_uid`
    fn open(&mut self, endpoint: &Endpoint, sop_class_uid: &str) -> Result<Self::Association>;

    /// Issue a find request, delivering each match to `on_response` as it arrives
    fn find(
        &mut self,
        association: &mut Self::Association,
        identifier: &InMemDicomObject,
        on_response: &mut dyn FnMut(InMemDicomObject),
    ) -> Result<usize>;

    /// Ask the remote peer to push the matches of `identifier` to `destination_aet`
    fn move_to(
        &mut self,
        association: &mut Self::Association,
        identifier: &InMemDicomObject,
        destination_aet: &str,
    ) -> Result<MoveSummary>;

    /// Release an association
    fn release(&mut self, association: Self::Association) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QrError;

    #[test]
    fn test_endpoint_validation() {
        let endpoint = Endpoint::new("pacs.local", 104, "PACS", "QRBROWSE");
        assert!(endpoint.validate().is_ok());
        assert_eq!(endpoint.remote_node().address(), "PACS@pacs.local:104");
        assert_eq!(endpoint.to_string(), "QRBROWSE -> PACS@pacs.local:104");

        let endpoint = Endpoint::new("pacs.local", 104, "PACS", "");
        assert!(matches!(endpoint.validate(), Err(QrError::Association(_))));
    }
}
