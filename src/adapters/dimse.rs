use dicom_object::InMemDicomObject;
use dimse::{DimseConfig, DimseScu, MoveSummary, ScuAssociation};
use tracing::{debug, info};

use crate::association::{AssociationService, Endpoint};
use crate::Result;

/// Association service speaking DIMSE over TCP
///
/// Each `open` negotiates one presentation context for the requested
/// query/retrieve SOP class, with the endpoint's calling AE title.
#[derive(Debug, Clone, Default)]
pub struct DimseAssociationService {
    config: DimseConfig,
}

impl DimseAssociationService {
    pub fn new(config: DimseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DimseConfig {
        &self.config
    }

    fn scu_for(&self, endpoint: &Endpoint) -> DimseScu {
        let mut config = self.config.clone();
        config.local_aet = endpoint.calling_ae_title.clone();
        DimseScu::new(config)
    }
}

impl AssociationService for DimseAssociationService {
    type Association = ScuAssociation;

    fn open(&mut self, endpoint: &Endpoint, sop_class_uid: &str) -> Result<ScuAssociation> {
        info!("Opening association {} for {}", endpoint, sop_class_uid);
        let association = self
            .scu_for(endpoint)
            .associate(&endpoint.remote_node(), sop_class_uid)?;
        Ok(association)
    }

    fn find(
        &mut self,
        association: &mut ScuAssociation,
        identifier: &InMemDicomObject,
        on_response: &mut dyn FnMut(InMemDicomObject),
    ) -> Result<usize> {
        let matches = association.find(identifier, on_response)?;
        debug!("C-FIND returned {} matches", matches);
        Ok(matches)
    }

    fn move_to(
        &mut self,
        association: &mut ScuAssociation,
        identifier: &InMemDicomObject,
        destination_aet: &str,
    ) -> Result<MoveSummary> {
        let summary = association.move_request(identifier, destination_aet)?;
        info!("C-MOVE to {} finished: {}", destination_aet, summary);
        Ok(summary)
    }

    fn release(&mut self, association: ScuAssociation) -> Result<()> {
        debug!("Releasing association with {}", association.node().ae_title);
        association.release()?;
        Ok(())
    }
}
