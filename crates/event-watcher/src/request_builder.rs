// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message;
use tcc_gateway_types::{
    CrossChainRequest, Event, TriggerInfo, TxContent, TxResultValue,
};
use tcc_gateway_utils::{Error, Result};

/// Turns trigger [`Event`]s into requests ready for the relay.
#[derive(Debug, Clone)]
pub struct CrossChainRequestBuilder {
    gateway_id: String,
    timeout: Duration,
}

impl CrossChainRequestBuilder {
    /// Creates a builder for the gateway `gateway_id`; requests wait at most
    /// `timeout` for their destination.
    pub fn new(gateway_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            timeout,
        }
    }

    /// Decodes the request template carried by `event`, checks that it was
    /// emitted for this gateway and completes it.
    ///
    /// Payloads that are not a request template fail with
    /// [`Error::NotCrossChainEvent`]: the trigger topic is not reserved, so
    /// unrelated contracts may emit it too.
    pub fn build(&self, event: &Event) -> Result<CrossChainRequest> {
        let [request_b64, trigger_b64] = event.data.as_slice() else {
            return Err(Error::NotCrossChainEvent(format!(
                "topic {}: expected 2 data items, got {}",
                event.topic,
                event.data.len()
            )));
        };
        let request_bytes = decode_base64(&event.topic, "request", request_b64)?;
        let trigger_bytes = decode_base64(&event.topic, "trigger", trigger_b64)?;

        let mut request = CrossChainRequest::decode(request_bytes.as_slice())
            .map_err(|e| {
                Error::NotCrossChainEvent(format!(
                    "topic {}: bad request template: {e}",
                    event.topic
                ))
            })?;
        if request.from != self.gateway_id {
            return Err(Error::ForeignGateway {
                expected: self.gateway_id.clone(),
                found: request.from,
            });
        }
        let trigger = TriggerInfo::decode(trigger_bytes.as_slice()).map_err(|e| {
            Error::NotCrossChainEvent(format!(
                "topic {}: bad trigger info: {e}",
                event.topic
            ))
        })?;
        if event.tx_bytes.is_empty() {
            return Err(Error::MissingTxBytes(event.tx_id.clone()));
        }

        request.tx_content = Some(TxContent {
            tx_id: event.tx_id.clone(),
            tx: event.tx_bytes.clone(),
            tx_result: TxResultValue::TxSuccess as i32,
            gateway_id: self.gateway_id.clone(),
            chain_rid: event.chain_rid.clone(),
            tx_prove: event.tx_prove.clone(),
            block_height: event.block_height,
        });
        request.timeout = self.timeout.as_secs() as i64;

        request
            .confirm_info
            .get_or_insert_with(Default::default)
            .parameter = trigger.src_confirm_param;
        request
            .cancel_info
            .get_or_insert_with(Default::default)
            .parameter = trigger.src_cancel_param;
        let Some(msg) = request.cross_chain_msg.first_mut() else {
            return Err(Error::NotCrossChainEvent(format!(
                "topic {}: request template has no cross-chain message",
                event.topic
            )));
        };
        msg.parameter = trigger.dest_try_param;
        msg.confirm_info
            .get_or_insert_with(Default::default)
            .parameter = trigger.dest_confirm_param;
        msg.cancel_info
            .get_or_insert_with(Default::default)
            .parameter = trigger.dest_cancel_param;
        Ok(request)
    }
}

fn decode_base64(topic: &str, what: &str, raw: &str) -> Result<Vec<u8>> {
    STANDARD.decode(raw).map_err(|e| {
        Error::NotCrossChainEvent(format!("topic {topic}: {what} is not base64: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use tcc_gateway_types::{
        CancelInfo, ConfirmInfo, CrossChainMsg, Version,
        CROSS_CHAIN_TRIGGER_EVENT,
    };

    use super::*;

    fn template(from: &str) -> CrossChainRequest {
        CrossChainRequest {
            version: Version::V100 as i32,
            cross_chain_name: "swap".into(),
            cross_chain_flag: "swap".into(),
            from: from.into(),
            cross_chain_msg: vec![CrossChainMsg {
                gateway_id: "gw2".into(),
                chain_rid: "chain2".into(),
                contract_name: "0xdest".into(),
                method: "lock".into(),
                confirm_info: Some(ConfirmInfo {
                    method: "commit".into(),
                    ..Default::default()
                }),
                cancel_info: Some(CancelInfo {
                    method: "rollback".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            confirm_info: Some(ConfirmInfo::default()),
            cancel_info: Some(CancelInfo::default()),
            ..Default::default()
        }
    }

    fn trigger() -> TriggerInfo {
        TriggerInfo {
            src_confirm_param: "[\"src-confirm\"]".into(),
            src_cancel_param: "[\"src-cancel\"]".into(),
            dest_try_param: "[\"try\"]".into(),
            dest_confirm_param: "[\"%CROSS_RESULT%\"]".into(),
            dest_cancel_param: "{}".into(),
        }
    }

    fn event(request: &CrossChainRequest, trigger: &TriggerInfo) -> Event {
        Event {
            topic: CROSS_CHAIN_TRIGGER_EVENT.into(),
            chain_rid: "chain1".into(),
            contract_name: "0xsrc".into(),
            tx_prove: "{}".into(),
            data: vec![
                STANDARD.encode(request.encode_to_vec()),
                STANDARD.encode(trigger.encode_to_vec()),
            ],
            tx_bytes: b"signed tx".to_vec(),
            tx_id: "0xabc".into(),
            block_height: 12,
        }
    }

    fn builder() -> CrossChainRequestBuilder {
        CrossChainRequestBuilder::new("gw1", Duration::from_secs(10))
    }

    #[test]
    fn completes_the_template() {
        let request = builder().build(&event(&template("gw1"), &trigger())).unwrap();

        let tx = request.tx_content.as_ref().unwrap();
        assert_eq!(tx.tx_id, "0xabc");
        assert_eq!(tx.tx, b"signed tx");
        assert_eq!(tx.gateway_id, "gw1");
        assert_eq!(tx.chain_rid, "chain1");
        assert_eq!(tx.block_height, 12);
        assert_eq!(tx.tx_result(), TxResultValue::TxSuccess);
        assert_eq!(request.timeout, 10);

        assert_eq!(request.confirm_info.unwrap().parameter, "[\"src-confirm\"]");
        assert_eq!(request.cancel_info.unwrap().parameter, "[\"src-cancel\"]");
        let msg = &request.cross_chain_msg[0];
        assert_eq!(msg.parameter, "[\"try\"]");
        let confirm = msg.confirm_info.as_ref().unwrap();
        assert_eq!(confirm.parameter, "[\"%CROSS_RESULT%\"]");
        assert_eq!(confirm.method, "commit");
        assert_eq!(msg.cancel_info.as_ref().unwrap().parameter, "{}");
    }

    #[test]
    fn wrong_number_of_items_is_not_a_cross_chain_event() {
        let mut event = event(&template("gw1"), &trigger());
        event.data.pop();
        assert!(matches!(
            builder().build(&event),
            Err(Error::NotCrossChainEvent(_))
        ));
    }

    #[test]
    fn garbage_payloads_are_not_cross_chain_events() {
        let mut event = event(&template("gw1"), &trigger());
        event.data[0] = "not base64!".into();
        assert!(matches!(
            builder().build(&event),
            Err(Error::NotCrossChainEvent(_))
        ));

        event.data[0] = STANDARD.encode([0xffu8, 0xff]);
        assert!(matches!(
            builder().build(&event),
            Err(Error::NotCrossChainEvent(_))
        ));
    }

    #[test]
    fn requests_of_other_gateways_are_rejected() {
        let event = event(&template("gw9"), &trigger());
        assert!(matches!(
            builder().build(&event),
            Err(Error::ForeignGateway { found, .. }) if found == "gw9"
        ));
    }

    #[test]
    fn transaction_bytes_are_required() {
        let mut event = event(&template("gw1"), &trigger());
        event.tx_bytes.clear();
        assert!(matches!(
            builder().build(&event),
            Err(Error::MissingTxBytes(id)) if id == "0xabc"
        ));
    }
}
