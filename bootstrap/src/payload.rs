use serde::Serialize;

use crate::auth::Principal;
use crate::env::PublicEnv;
use crate::honeypot::HoneypotInputProps;
use crate::request_info::RequestInfo;
use crate::toast::Toast;

/// Everything the root layout needs to render a page.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootPayload {
    pub user: Option<Principal>,
    pub request_info: RequestInfo,
    #[serde(rename = "ENV")]
    pub env: PublicEnv,
    pub toast: Option<Toast>,
    pub honey_props: HoneypotInputProps,
    /// Raw `wagmi.store=<value>` cookie pair, handed to the wallet connector unchanged.
    pub wagmi_initial: Option<String>,
}
