//! Service Class User (SCU) implementation for outbound DIMSE operations
//!
//! Associations are blocking: every call returns only once the remote
//! exchange has finished or failed.

use std::net::TcpStream;

use dicom_core::{dicom_value, DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_encoding::transfer_syntax::{TransferSyntax, TransferSyntaxIndex};
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use dicom_ul::association::client::{ClientAssociation, ClientAssociationOptions};
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use tracing::{debug, info, warn};

use crate::config::{DimseConfig, RemoteNode};
use crate::types::{DimseCommand, DimseStatus, MoveSummary};
use crate::{DimseError, Result};

type Connection = ClientAssociation<TcpStream>;

static REGISTRY: TransferSyntaxRegistry = TransferSyntaxRegistry;

/// Command Data Set Type value announcing that no data set follows
const NO_DATA_SET: u16 = 0x0101;

/// Header bytes of a P-DATA-TF PDU carrying a single PDV
const PDV_OVERHEAD: u32 = 12;

/// DIMSE Service Class User
#[derive(Debug, Clone)]
pub struct DimseScu {
    config: DimseConfig,
}

/// An established association with a remote node, bound to one abstract syntax
pub struct ScuAssociation {
    connection: Connection,
    node: RemoteNode,
    abstract_syntax: String,
    presentation_context_id: u8,
    transfer_syntax: &'static TransferSyntax,
    priority: u16,
    max_fragment: usize,
    next_message_id: u16,
}

/// One decoded DIMSE message: command set plus optional data set
struct Message {
    command: InMemDicomObject,
    data: Option<InMemDicomObject>,
}

impl DimseScu {
    /// Create a new SCU with the given configuration
    pub fn new(config: DimseConfig) -> Self {
        Self { config }
    }

    /// Local AE title used as the calling AE title
    pub fn local_aet(&self) -> &str {
        &self.config.local_aet
    }

    /// Open an association proposing a single abstract syntax
    pub fn associate(&self, node: &RemoteNode, abstract_syntax: &str) -> Result<ScuAssociation> {
        node.validate()?;
        self.config.validate()?;

        let max_pdu = node.max_pdu.unwrap_or(self.config.max_pdu);
        info!(
            "Opening association {} -> {} ({})",
            self.config.local_aet,
            node.address(),
            abstract_syntax
        );

        let connection = ClientAssociationOptions::new()
            .with_abstract_syntax(abstract_syntax.to_string())
            .calling_ae_title(self.config.local_aet.clone())
            .max_pdu_length(max_pdu)
            .strict(self.config.strict)
            .establish_with(&node.address())
            .map_err(|e| DimseError::AssociationRejected(format!("{}: {}", node.address(), e)))?;

        let pc = connection
            .presentation_contexts()
            .first()
            .ok_or_else(|| {
                DimseError::AssociationRejected(format!(
                    "{} accepted no presentation context for {}",
                    node.address(),
                    abstract_syntax
                ))
            })?;
        let presentation_context_id = pc.id;
        let ts_uid = pc.transfer_syntax.trim_end_matches(|c: char| c == '\0' || c == ' ');
        let transfer_syntax = REGISTRY.get(ts_uid).ok_or_else(|| {
            DimseError::NotSupported(format!("Negotiated transfer syntax {}", ts_uid))
        })?;

        debug!(
            "Association established: pc={} ts={}",
            presentation_context_id, ts_uid
        );

        Ok(ScuAssociation {
            connection,
            node: node.clone(),
            abstract_syntax: abstract_syntax.to_string(),
            presentation_context_id,
            transfer_syntax,
            priority: self.config.priority.code(),
            max_fragment: max_pdu.saturating_sub(PDV_OVERHEAD).max(1) as usize,
            next_message_id: 1,
        })
    }
}

impl ScuAssociation {
    /// Remote node this association is connected to
    pub fn node(&self) -> &RemoteNode {
        &self.node
    }

    /// Abstract syntax (SOP class) negotiated for this association
    pub fn abstract_syntax(&self) -> &str {
        &self.abstract_syntax
    }

    /// Send a C-FIND request and hand every pending match to `on_match`.
    ///
    /// Returns the number of matches delivered.
    pub fn find(
        &mut self,
        identifier: &InMemDicomObject,
        on_match: &mut dyn FnMut(InMemDicomObject),
    ) -> Result<usize> {
        let message_id = self.send_request(DimseCommand::Find, identifier, None)?;
        let mut matches = 0;

        loop {
            let message = self.receive_message()?;
            check_response(&message.command, DimseCommand::Find, message_id)?;
            let status = DimseStatus::from_code(status_of(&message.command)?);

            match status {
                DimseStatus::Pending => {
                    if let Some(data) = message.data {
                        matches += 1;
                        on_match(data);
                    } else {
                        warn!("Pending C-FIND response without identifier");
                    }
                }
                DimseStatus::Failure(code) => {
                    return Err(DimseError::Status {
                        operation: DimseCommand::Find.name(),
                        status: code,
                    });
                }
                status => {
                    debug!("C-FIND finished with {:?} after {} matches", status, matches);
                    return Ok(matches);
                }
            }
        }
    }

    /// Send a C-MOVE request asking the remote node to push matches to `destination_aet`
    pub fn move_request(
        &mut self,
        identifier: &InMemDicomObject,
        destination_aet: &str,
    ) -> Result<MoveSummary> {
        crate::config::validate_ae_title(destination_aet)?;
        let message_id = self.send_request(DimseCommand::Move, identifier, Some(destination_aet))?;
        let mut summary = MoveSummary::default();

        loop {
            let message = self.receive_message()?;
            check_response(&message.command, DimseCommand::Move, message_id)?;
            let code = status_of(&message.command)?;
            update_summary(&mut summary, &message.command);

            match DimseStatus::from_code(code) {
                DimseStatus::Pending => {
                    debug!("C-MOVE pending: {}", summary);
                }
                DimseStatus::Failure(code) => {
                    warn!("C-MOVE failed with status {:#06X}: {}", code, summary);
                    return Err(DimseError::Status {
                        operation: DimseCommand::Move.name(),
                        status: code,
                    });
                }
                status => {
                    info!("C-MOVE finished ({:?}): {}", status, summary);
                    return Ok(summary);
                }
            }
        }
    }

    /// Gracefully release the association
    pub fn release(self) -> Result<()> {
        info!("Releasing association with {}", self.node.address());
        self.connection
            .release()
            .map_err(|e| DimseError::DicomUl(e.to_string()))
    }

    fn send_request(
        &mut self,
        command: DimseCommand,
        identifier: &InMemDicomObject,
        destination_aet: Option<&str>,
    ) -> Result<u16> {
        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1).max(1);

        let mut elements = vec![
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(self.abstract_syntax.as_str()),
            ),
            DataElement::new(
                tags::COMMAND_FIELD,
                VR::US,
                dicom_value!(U16, [command.request_field()]),
            ),
            DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [message_id])),
            DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [self.priority])),
            DataElement::new(
                tags::COMMAND_DATA_SET_TYPE,
                VR::US,
                dicom_value!(U16, [0x0001]),
            ),
        ];
        if let Some(destination) = destination_aet {
            elements.push(DataElement::new(
                tags::MOVE_DESTINATION,
                VR::AE,
                PrimitiveValue::from(destination),
            ));
        }
        let command_set = InMemDicomObject::command_from_element_iter(elements);

        let mut command_bytes = Vec::with_capacity(128);
        command_set
            .write_dataset_with_ts(&mut command_bytes, &IMPLICIT_VR_LITTLE_ENDIAN.erased())
            .map_err(|e| DimseError::dicom_object(format!("encode command: {}", e)))?;

        let mut data_bytes = Vec::with_capacity(256);
        identifier
            .write_dataset_with_ts(&mut data_bytes, self.transfer_syntax)
            .map_err(|e| DimseError::dicom_object(format!("encode identifier: {}", e)))?;

        debug!(
            "Sending {} (message id {}) to {}",
            command.name(),
            message_id,
            self.node.address()
        );
        self.send_fragments(PDataValueType::Command, command_bytes)?;
        self.send_fragments(PDataValueType::Data, data_bytes)?;
        Ok(message_id)
    }

    fn send_fragments(&mut self, value_type: PDataValueType, bytes: Vec<u8>) -> Result<()> {
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&bytes[..]]
        } else {
            bytes.chunks(self.max_fragment).collect()
        };
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let pdu = Pdu::PData {
                data: vec![PDataValue {
                    presentation_context_id: self.presentation_context_id,
                    value_type: value_type.clone(),
                    is_last: i == last,
                    data: chunk.to_vec(),
                }],
            };
            self.connection
                .send(&pdu)
                .map_err(|e| DimseError::DicomUl(e.to_string()))?;
        }
        Ok(())
    }

    fn receive_message(&mut self) -> Result<Message> {
        let mut command_bytes = Vec::new();
        let mut data_bytes = Vec::new();
        let mut command: Option<InMemDicomObject> = None;
        let mut data_complete = false;

        loop {
            let pdu = self
                .connection
                .receive()
                .map_err(|e| DimseError::DicomUl(e.to_string()))?;

            match pdu {
                Pdu::PData { data } => {
                    for value in data {
                        match value.value_type {
                            PDataValueType::Command => {
                                command_bytes.extend_from_slice(&value.data);
                                if value.is_last {
                                    let decoded = InMemDicomObject::read_dataset_with_ts(
                                        &command_bytes[..],
                                        &IMPLICIT_VR_LITTLE_ENDIAN.erased(),
                                    )
                                    .map_err(|e| {
                                        DimseError::dicom_object(format!("decode command: {}", e))
                                    })?;
                                    command = Some(decoded);
                                }
                            }
                            PDataValueType::Data => {
                                data_bytes.extend_from_slice(&value.data);
                                data_complete = value.is_last;
                            }
                        }
                    }
                }
                Pdu::AbortRQ { source } => {
                    return Err(DimseError::OperationFailed(format!(
                        "Association aborted by peer: {:?}",
                        source
                    )));
                }
                Pdu::ReleaseRQ => {
                    return Err(DimseError::operation_failed(
                        "Peer requested release in the middle of an operation",
                    ));
                }
                other => {
                    return Err(DimseError::OperationFailed(format!(
                        "Unexpected PDU: {:?}",
                        other
                    )));
                }
            }

            if let Some(command) = command.take() {
                let expects_data =
                    command_u16(&command, tags::COMMAND_DATA_SET_TYPE) != Some(NO_DATA_SET);
                if !expects_data {
                    return Ok(Message { command, data: None });
                }
                if data_complete {
                    let data = InMemDicomObject::read_dataset_with_ts(
                        &data_bytes[..],
                        self.transfer_syntax,
                    )
                    .map_err(|e| DimseError::dicom_object(format!("decode identifier: {}", e)))?;
                    return Ok(Message {
                        command,
                        data: Some(data),
                    });
                }
                // data set still in flight
                return self.receive_data_set(command, data_bytes);
            }
        }
    }

    fn receive_data_set(
        &mut self,
        command: InMemDicomObject,
        mut data_bytes: Vec<u8>,
    ) -> Result<Message> {
        loop {
            let pdu = self
                .connection
                .receive()
                .map_err(|e| DimseError::DicomUl(e.to_string()))?;
            let Pdu::PData { data } = pdu else {
                return Err(DimseError::OperationFailed(format!(
                    "Expected data set fragment, got {:?}",
                    pdu
                )));
            };
            for value in data {
                if !matches!(value.value_type, PDataValueType::Data) {
                    return Err(DimseError::operation_failed(
                        "Command fragment received while reading a data set",
                    ));
                }
                data_bytes.extend_from_slice(&value.data);
                if value.is_last {
                    let data = InMemDicomObject::read_dataset_with_ts(
                        &data_bytes[..],
                        self.transfer_syntax,
                    )
                    .map_err(|e| DimseError::dicom_object(format!("decode identifier: {}", e)))?;
                    return Ok(Message {
                        command,
                        data: Some(data),
                    });
                }
            }
        }
    }
}

fn command_u16(command: &InMemDicomObject, tag: Tag) -> Option<u16> {
    command
        .element(tag)
        .ok()
        .and_then(|e| e.to_int::<u16>().ok())
}

fn status_of(command: &InMemDicomObject) -> Result<u16> {
    command_u16(command, tags::STATUS)
        .ok_or_else(|| DimseError::operation_failed("Response without Status"))
}

fn check_response(command: &InMemDicomObject, expected: DimseCommand, message_id: u16) -> Result<()> {
    let field = command_u16(command, tags::COMMAND_FIELD);
    if field != Some(expected.response_field()) {
        return Err(DimseError::OperationFailed(format!(
            "Expected {} response, got command field {:?}",
            expected.name(),
            field
        )));
    }
    let responded_to = command_u16(command, tags::MESSAGE_ID_BEING_RESPONDED_TO);
    if responded_to.is_some() && responded_to != Some(message_id) {
        warn!(
            "{} response refers to message {:?}, expected {}",
            expected.name(),
            responded_to,
            message_id
        );
    }
    Ok(())
}

fn update_summary(summary: &mut MoveSummary, command: &InMemDicomObject) {
    let counter = |tag| command_u16(command, tag).map(u32::from);
    if let Some(v) = counter(tags::NUMBER_OF_REMAINING_SUBOPERATIONS) {
        summary.remaining = v;
    }
    if let Some(v) = counter(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS) {
        summary.completed = v;
    }
    if let Some(v) = counter(tags::NUMBER_OF_FAILED_SUBOPERATIONS) {
        summary.failed = v;
    }
    if let Some(v) = counter(tags::NUMBER_OF_WARNING_SUBOPERATIONS) {
        summary.warning = v;
    }
}
