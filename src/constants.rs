// -
// Push

/// Serialized payloads longer than this are gzip-compressed before a datagram push
pub(crate) const COMPRESS_THRESHOLD_BYTES: usize = 1024;

/// `type` field of a datagram push packet carrying service data
pub(crate) const PUSH_PACKET_TYPE_DOM: &str = "dom";

/// Separator between group and service name in Nacos grouped service names
pub(crate) const GROUP_SERVICE_SEPARATOR: &str = "@@";

pub(crate) const DEFAULT_NAMESPACE: &str = "public";
pub(crate) const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

// -
// Acknowledgement result codes

pub(crate) const RESPONSE_CODE_SUCCESS: i32 = 200;
pub(crate) const RESPONSE_CODE_FAIL: i32 = 500;

/// Error code attached to a failed ack synthesized when the stream send itself fails
pub(crate) const ERROR_CODE_STREAM_SEND_FAILED: i32 = 503;

// -
// Metric labels

pub(crate) const LABEL_SUCCESS: &str = "success";
pub(crate) const LABEL_FAILURE: &str = "failure";
