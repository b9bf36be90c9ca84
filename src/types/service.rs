//! Service request and response shapes.
//!
//! Field order and widths follow the OPC UA type dictionary. Arrays are
//! length-linked through an Int32 `no_of_*` sibling declared just before them,
//! so the count is always written from the array's actual length.

use crate::types::builtin::{
    ByteString, DateTime, DiagnosticInfo, ExpandedNodeId, ExtensionObject, LocalizedText, NodeId,
    QualifiedName, StatusCode,
};
use crate::ua_struct;

/// `ApplicationDescription.application_type` values
pub mod application_type {
    pub const SERVER: u32 = 0;
    pub const CLIENT: u32 = 1;
    pub const CLIENT_AND_SERVER: u32 = 2;
    pub const DISCOVERY_SERVER: u32 = 3;
}

/// `BrowseDescription.browse_direction` values
pub mod browse_direction {
    pub const FORWARD: u32 = 0;
    pub const INVERSE: u32 = 1;
    pub const BOTH: u32 = 2;
}

ua_struct! {
    /// Common header of every request
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct RequestHeader {
        pub authentication_token: NodeId,
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub return_diagnostics: u32,
        pub audit_entry_id: String,
        pub timeout_hint: u32,
        pub additional_header: ExtensionObject,
    }
}

impl RequestHeader {
    /// Header stamped with the current time
    pub fn new(authentication_token: NodeId, request_handle: u32) -> Self {
        Self {
            authentication_token,
            timestamp: DateTime::now(),
            request_handle,
            ..Self::default()
        }
    }
}

ua_struct! {
    /// Common header of every response
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ResponseHeader {
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub service_result: StatusCode,
        pub service_diagnostics: DiagnosticInfo,
        pub no_of_string_table: i32,
        #[ua(tag = "lengthField=no_of_string_table")]
        pub string_table: Vec<String>,
        pub additional_header: ExtensionObject,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ApplicationDescription {
        pub application_uri: String,
        pub product_uri: String,
        pub application_name: LocalizedText,
        pub application_type: u32,
        pub gateway_server_uri: String,
        pub discovery_profile_uri: String,
        pub no_of_discovery_urls: i32,
        #[ua(tag = "lengthField=no_of_discovery_urls")]
        pub discovery_urls: Vec<String>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct UserTokenPolicy {
        pub policy_id: String,
        pub token_type: u32,
        pub issued_token_type: String,
        pub issuer_endpoint_url: String,
        pub security_policy_uri: String,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct EndpointDescription {
        pub endpoint_url: String,
        pub server: ApplicationDescription,
        pub server_certificate: ByteString,
        pub security_mode: u32,
        pub security_policy_uri: String,
        pub no_of_user_identity_tokens: i32,
        #[ua(tag = "lengthField=no_of_user_identity_tokens")]
        pub user_identity_tokens: Vec<UserTokenPolicy>,
        pub transport_profile_uri: String,
        pub security_level: u8,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct SignatureData {
        pub algorithm: String,
        pub signature: ByteString,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct SignedSoftwareCertificate {
        pub certificate_data: ByteString,
        pub signature: ByteString,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct CreateSessionRequest {
        pub request_header: RequestHeader,
        pub client_description: ApplicationDescription,
        pub server_uri: String,
        pub endpoint_url: String,
        pub session_name: String,
        pub client_nonce: ByteString,
        pub client_certificate: ByteString,
        pub requested_session_timeout: f64,
        pub max_response_message_size: u32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct CreateSessionResponse {
        pub response_header: ResponseHeader,
        pub session_id: NodeId,
        pub authentication_token: NodeId,
        pub revised_session_timeout: f64,
        pub server_nonce: ByteString,
        pub server_certificate: ByteString,
        pub no_of_server_endpoints: i32,
        #[ua(tag = "lengthField=no_of_server_endpoints")]
        pub server_endpoints: Vec<EndpointDescription>,
        pub no_of_server_software_certificates: i32,
        #[ua(tag = "lengthField=no_of_server_software_certificates")]
        pub server_software_certificates: Vec<SignedSoftwareCertificate>,
        pub server_signature: SignatureData,
        pub max_request_message_size: u32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ActivateSessionRequest {
        pub request_header: RequestHeader,
        pub client_signature: SignatureData,
        pub no_of_client_software_certificates: i32,
        #[ua(tag = "lengthField=no_of_client_software_certificates")]
        pub client_software_certificates: Vec<SignedSoftwareCertificate>,
        pub no_of_locale_ids: i32,
        #[ua(tag = "lengthField=no_of_locale_ids")]
        pub locale_ids: Vec<String>,
        pub user_identity_token: ExtensionObject,
        pub user_token_signature: SignatureData,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ActivateSessionResponse {
        pub response_header: ResponseHeader,
        pub server_nonce: ByteString,
        pub no_of_results: i32,
        #[ua(tag = "lengthField=no_of_results")]
        pub results: Vec<StatusCode>,
        pub no_of_diagnostic_infos: i32,
        #[ua(tag = "lengthField=no_of_diagnostic_infos")]
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ViewDescription {
        pub view_id: NodeId,
        pub timestamp: DateTime,
        pub view_version: u32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct BrowseDescription {
        pub node_id: NodeId,
        pub browse_direction: u32,
        pub reference_type_id: NodeId,
        pub include_subtypes: bool,
        pub node_class_mask: u32,
        pub result_mask: u32,
    }
}

impl BrowseDescription {
    /// Forward browse of every reference from `node_id`, all result fields
    pub fn forward(node_id: NodeId) -> Self {
        Self {
            node_id,
            browse_direction: browse_direction::FORWARD,
            include_subtypes: true,
            result_mask: 0x3F,
            ..Self::default()
        }
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct BrowseRequest {
        pub request_header: RequestHeader,
        pub view: ViewDescription,
        pub requested_max_references_per_node: u32,
        pub no_of_nodes_to_browse: i32,
        #[ua(tag = "lengthField=no_of_nodes_to_browse")]
        pub nodes_to_browse: Vec<BrowseDescription>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ReferenceDescription {
        pub reference_type_id: NodeId,
        pub is_forward: bool,
        pub node_id: ExpandedNodeId,
        pub browse_name: QualifiedName,
        pub display_name: LocalizedText,
        pub node_class: u32,
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct BrowseResult {
        pub status_code: StatusCode,
        pub continuation_point: ByteString,
        pub no_of_references: i32,
        #[ua(tag = "lengthField=no_of_references")]
        pub references: Vec<ReferenceDescription>,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct BrowseResponse {
        pub response_header: ResponseHeader,
        pub no_of_results: i32,
        #[ua(tag = "lengthField=no_of_results")]
        pub results: Vec<BrowseResult>,
        pub no_of_diagnostic_infos: i32,
        #[ua(tag = "lengthField=no_of_diagnostic_infos")]
        pub diagnostic_infos: Vec<DiagnosticInfo>,
    }
}

ua_struct! {
    /// Sent in place of any response when the service failed as a whole
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct ServiceFault {
        pub response_header: ResponseHeader,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{decode, encode};
    use crate::core::descriptor::Structure;

    #[test]
    fn test_count_follows_array() {
        let desc = ApplicationDescription {
            application_uri: "urn:client".into(),
            discovery_urls: vec!["opc.tcp://a:4840".into(), "opc.tcp://b:4840".into()],
            no_of_discovery_urls: 0,
            ..ApplicationDescription::default()
        };
        let bytes = encode(&desc).unwrap();
        let back = decode::<ApplicationDescription>(&bytes).unwrap();
        assert_eq!(back.no_of_discovery_urls, 2);
        assert_eq!(back.discovery_urls, desc.discovery_urls);
    }

    #[test]
    fn test_empty_array_count_is_zero() {
        let bytes = encode(&SignatureData::default()).unwrap();
        // null string, null byte string
        assert_eq!(&bytes[..], &[0xFF; 8]);

        let result = BrowseResult::default();
        let bytes = encode(&result).unwrap();
        assert_eq!(&bytes[8..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_response_header_layout() {
        let record = ResponseHeader::descriptor().unwrap();
        assert_eq!(
            record.names(),
            vec![
                "timestamp",
                "request_handle",
                "service_result",
                "service_diagnostics",
                "no_of_string_table",
                "string_table",
                "additional_header",
            ]
        );
        let table = record.field("string_table").unwrap();
        assert_eq!(table.length_field, "no_of_string_table");
    }

    #[test]
    fn test_browse_response_round_trip() {
        let response = BrowseResponse {
            results: vec![BrowseResult {
                references: vec![ReferenceDescription {
                    reference_type_id: NodeId::numeric(0, 35),
                    is_forward: true,
                    node_id: NodeId::numeric(0, 85).into(),
                    browse_name: QualifiedName::new(0, "Objects"),
                    display_name: LocalizedText::text("Objects"),
                    node_class: 1,
                    type_definition: NodeId::numeric(0, 61).into(),
                }],
                no_of_references: 1,
                ..BrowseResult::default()
            }],
            no_of_results: 1,
            ..BrowseResponse::default()
        };
        let bytes = encode(&response).unwrap();
        assert_eq!(decode::<BrowseResponse>(&bytes).unwrap(), response);
    }
}
