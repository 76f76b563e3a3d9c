use std::sync::Arc;

use crate::openai::BoxedToolCall;
use crate::ucp::UcpClient;

pub mod catalog;
pub use catalog::ListProductsTool;

pub mod checkout;
pub use checkout::{
    CompletePaymentTool, CreateCheckoutTool, UpdateCheckoutAddressTool, UpdateShippingOptionTool,
};

/// The fixed tool catalog exposed to the model, all bound to the same
/// shared commerce client.
pub fn ucp_tools(ucp: &Arc<UcpClient>) -> Vec<BoxedToolCall> {
    vec![
        Box::new(ListProductsTool::new(Arc::clone(ucp))),
        Box::new(CreateCheckoutTool::new(Arc::clone(ucp))),
        Box::new(UpdateCheckoutAddressTool::new(Arc::clone(ucp))),
        Box::new(UpdateShippingOptionTool::new(Arc::clone(ucp))),
        Box::new(CompletePaymentTool::new(Arc::clone(ucp))),
    ]
}
