mod panic;
mod request_id;

pub use panic::catch_panic_layer;
pub use request_id::{
    REQUEST_ID_HEADER, propagate_request_id_layer, request_trace_layer, set_request_id_layer,
};
