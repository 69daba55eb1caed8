//! UseCase: 接続元の検査（Access Gate）
//!
//! WebSocket へのアップグレード前に Origin を許可ポリシーと照合する。
//! 拒否された接続は他のどのコンポーネントにも渡らない。

use crate::domain::{AccessDecision, ConnectionRequest, OriginPolicy};

pub struct AccessGate {
    policy: OriginPolicy,
}

impl AccessGate {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    /// Decide whether to admit the connection attempt and log the decision.
    pub fn check(&self, request: &ConnectionRequest) -> AccessDecision {
        let decision = self.policy.evaluate(request.origin.as_deref());
        let origin = request.origin.as_deref().unwrap_or("-");
        let user_agent = request.user_agent.as_deref().unwrap_or("-");
        let remote_addr = request.remote_addr.as_deref().unwrap_or("-");

        match &decision {
            AccessDecision::Admit { reason } => tracing::info!(
                origin,
                user_agent,
                remote_addr,
                "Connection admitted: {}",
                reason
            ),
            AccessDecision::AdmitWithWarning { reason } => tracing::warn!(
                origin,
                user_agent,
                remote_addr,
                "Connection admitted with warning: {}",
                reason
            ),
            AccessDecision::Reject { reason } => tracing::warn!(
                origin,
                user_agent,
                remote_addr,
                "Connection rejected: {}",
                reason
            ),
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GateMode;

    fn request(origin: Option<&str>) -> ConnectionRequest {
        ConnectionRequest {
            origin: origin.map(str::to_string),
            user_agent: Some("test-agent".to_string()),
            remote_addr: Some("127.0.0.1".to_string()),
        }
    }

    #[test]
    fn test_strict_gate() {
        // テスト項目: strict モードでは許可リスト外の Origin を拒否し、リスト内と Origin 無しは許可する
        // given (前提条件):
        let gate = AccessGate::new(OriginPolicy::from_entries(
            ["https://app.example.com", "*.vercel.app"],
            GateMode::Strict,
        ));

        // when (操作):
        let exact = gate.check(&request(Some("https://app.example.com")));
        let suffix = gate.check(&request(Some("https://preview-123.vercel.app")));
        let unknown = gate.check(&request(Some("https://evil.example.net")));
        let missing = gate.check(&request(None));

        // then (期待する結果):
        assert!(matches!(exact, AccessDecision::Admit { .. }));
        assert!(matches!(suffix, AccessDecision::Admit { .. }));
        assert!(matches!(unknown, AccessDecision::Reject { .. }));
        assert!(matches!(missing, AccessDecision::Admit { .. }));
    }

    #[test]
    fn test_permissive_gate_warns() {
        // テスト項目: permissive モードでは許可リスト外の Origin も警告付きで許可する
        // given (前提条件):
        let gate = AccessGate::new(OriginPolicy::from_entries(
            ["https://app.example.com"],
            GateMode::Permissive,
        ));

        // when (操作):
        let decision = gate.check(&request(Some("http://localhost:5173")));

        // then (期待する結果):
        assert!(matches!(decision, AccessDecision::AdmitWithWarning { .. }));
        assert!(decision.is_admitted());
    }
}
