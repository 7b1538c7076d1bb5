//! 终端宿主
//!
//! 把标准输入的每一行当作一次解码事件或用户操作交给扫码会话，
//! 每一步之后根据会话状态渲染提示。

use anyhow::{bail, Result};
use boothfleet_activation::models::{BoothSubscription, Conflict, PreCheckResult, Recovery};
use boothfleet_activation::session::{Failure, FailureKind, Stage};
use boothfleet_activation::{ScanSession, SessionError, SessionState};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info};

/// 宿主运行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    Activated { booth_id: String },
    /// 用户取消或输入结束
    Cancelled,
    /// 失败后用户选择离开
    Left,
}

pub struct TerminalHost<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> TerminalHost<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// 输出提示并读取一行，输入结束时返回 `None`
    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.out, "{}", text)?;
        self.out.flush()?;
        let line = self.lines.next_line().await?;
        Ok(line.map(|l| l.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// 驱动一次完整的激活会话
    pub async fn run(&mut self, session: &mut ScanSession) -> Result<HostOutcome> {
        session.start()?;

        loop {
            let state = session.state().clone();
            debug!("[Console] 渲染状态: {}", state);

            let step = match state {
                // 1. 等待扫码
                SessionState::Scanning => {
                    let Some(line) = self.prompt("请扫描展台二维码（输入 q 退出）> ").await? else {
                        return self.quit(session);
                    };
                    if is_quit(&line) {
                        return self.quit(session);
                    }
                    session.on_decode(&line).await.map(|_| ())
                }

                // 2. 二维码无效，确认后重新扫描
                SessionState::InvalidQr { message } => {
                    writeln!(self.out, "✗ {}", message)?;
                    match self.prompt("按回车重新扫描> ").await? {
                        Some(line) if !is_quit(&line) => session.acknowledge_invalid(),
                        _ => return self.quit(session),
                    }
                }

                // 3. 选择展台
                SessionState::SelectingBooth { booths, current } => {
                    write!(self.out, "{}", render_booths(&booths, current.as_deref()))?;
                    let Some(line) = self.prompt("选择展台（编号或 ID，q 退出）> ").await? else {
                        return self.quit(session);
                    };
                    if is_quit(&line) {
                        return self.quit(session);
                    }
                    match parse_booth_choice(&line, &booths) {
                        Some(booth_id) => session.select_booth(&booth_id).await,
                        None => {
                            writeln!(self.out, "无效的选择: {}", line.trim())?;
                            continue;
                        }
                    }
                }

                // 4. 一次性确认全部冲突
                SessionState::ConfirmingConflicts { pre_check } => {
                    write!(self.out, "{}", render_conflicts(&pre_check))?;
                    let answer = self
                        .prompt("确认以上全部变更并继续激活？[y/N]> ")
                        .await?
                        .unwrap_or_default();
                    if is_yes(&answer) {
                        session.confirm_conflicts().await
                    } else {
                        session.decline_conflicts().await
                    }
                }

                // 5. 激活成功
                SessionState::Succeeded {
                    booth_id,
                    booth_name,
                    success,
                } => {
                    writeln!(
                        self.out,
                        "✓ 展台「{}」激活成功",
                        booth_name.as_deref().unwrap_or(&booth_id)
                    )?;
                    if let Some(fp) = &success.fingerprint_short {
                        writeln!(self.out, "  设备指纹: {}", fp)?;
                    }
                    writeln!(self.out, "  许可证: {}", success.license_key)?;
                    if let Some(sync) = &success.cloud_sync {
                        writeln!(self.out, "  云同步: {}", sync.sync_endpoint)?;
                    }
                    self.prompt("按回车完成> ").await?;
                    session.acknowledge()?;
                    info!("[Console] 激活流程完成: booth={}", booth_id);
                    return Ok(HostOutcome::Activated { booth_id });
                }

                // 6. 失败，按恢复路径给出选项
                SessionState::Failed(failure) => {
                    write!(self.out, "{}", render_failure(&failure))?;
                    let answer = self
                        .prompt(failure_prompt(failure.recovery))
                        .await?
                        .unwrap_or_else(|| "q".to_string());
                    match (answer.trim(), failure.recovery) {
                        ("r", Recovery::RetrySameBooth) => session.retry().await,
                        ("b", Recovery::RetrySameBooth | Recovery::ChooseAnotherBooth) => {
                            session.choose_another_booth().await
                        }
                        _ => {
                            session.acknowledge()?;
                            return Ok(HostOutcome::Left);
                        }
                    }
                }

                SessionState::Idle => return Ok(HostOutcome::Cancelled),

                // 方法返回时不会停留在请求中的状态
                SessionState::LoadingBooths
                | SessionState::PreChecking { .. }
                | SessionState::Activating { .. } => {
                    bail!("会话停留在请求中的状态: {}", state)
                }
            };

            match step {
                Ok(()) => {}
                Err(SessionError::Cancelled) => {
                    writeln!(self.out, "激活已取消")?;
                    return Ok(HostOutcome::Cancelled);
                }
                Err(e) => writeln!(self.out, "{}", e)?,
            }
        }
    }

    fn quit(&mut self, session: &mut ScanSession) -> Result<HostOutcome> {
        session.cancel();
        writeln!(self.out, "已退出激活流程")?;
        Ok(HostOutcome::Cancelled)
    }
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim(), "q" | "quit" | "exit")
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

/// 解析展台选择：1 起始的编号或展台 ID
pub fn parse_booth_choice(input: &str, booths: &[BoothSubscription]) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(index) = input.parse::<usize>() {
        if let Some(booth) = index.checked_sub(1).and_then(|i| booths.get(i)) {
            return Some(booth.booth_id.clone());
        }
    }
    booths
        .iter()
        .find(|b| b.booth_id == input)
        .map(|b| b.booth_id.clone())
}

pub fn render_booths(booths: &[BoothSubscription], current: Option<&str>) -> String {
    if booths.is_empty() {
        return "当前账号下没有展台，请先创建展台\n".to_string();
    }

    let mut out = String::from("可激活的展台:\n");
    for (i, booth) in booths.iter().enumerate() {
        let marker = if current == Some(booth.booth_id.as_str()) {
            "*"
        } else {
            " "
        };
        let subscription = if booth.has_valid_subscription() {
            "订阅有效"
        } else {
            "无有效订阅"
        };
        out.push_str(&format!(
            "{} {}. {} ({}) - {}\n",
            marker,
            i + 1,
            booth.booth_name,
            booth.booth_id,
            subscription
        ));
    }
    out
}

pub fn render_conflicts(pre_check: &PreCheckResult) -> String {
    let mut out = format!(
        "激活到展台「{}」将产生以下变更:\n",
        pre_check
            .booth_name
            .as_deref()
            .unwrap_or(&pre_check.booth_id)
    );
    for conflict in &pre_check.conflicts {
        let tag = match conflict {
            Conflict::FingerprintBoundElsewhere { .. } => "重新绑定",
            Conflict::BoothHasOtherDeviceData { .. } => "清除旧数据",
        };
        out.push_str(&format!("  - [{}] {}\n", tag, conflict.describe()));
    }
    out
}

pub fn render_failure(failure: &Failure) -> String {
    let title = match &failure.kind {
        FailureKind::SubscriptionRequired => "需要订阅".to_string(),
        FailureKind::Activation(code) => format!("激活失败 ({})", code),
        FailureKind::Transport(Stage::ListBooths) => "无法获取展台列表".to_string(),
        FailureKind::Transport(Stage::PreCheck) => "预检请求失败".to_string(),
        FailureKind::Transport(Stage::Activate) => "激活请求失败".to_string(),
        FailureKind::CredentialStorage => "许可证未保存".to_string(),
    };
    format!("✗ {}: {}\n", title, failure.message)
}

fn failure_prompt(recovery: Recovery) -> &'static str {
    match recovery {
        Recovery::RetrySameBooth => "r 重试 / b 选择其他展台 / q 退出> ",
        Recovery::ChooseAnotherBooth => "b 选择其他展台 / q 退出> ",
        Recovery::RegenerateLicense => {
            "请稍后执行 `boothfleet regenerate --booth <ID>` 重新生成许可证，按回车退出> "
        }
        Recovery::Leave => "按回车退出> ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boothfleet_activation::models::{ActivationErrorCode, SubscriptionStatus};

    fn booths() -> Vec<BoothSubscription> {
        vec![
            BoothSubscription {
                booth_id: "B1".to_string(),
                booth_name: "Lobby".to_string(),
                status: SubscriptionStatus::Active,
                plan_name: None,
                current_period_end: None,
            },
            BoothSubscription {
                booth_id: "B2".to_string(),
                booth_name: "Mall".to_string(),
                status: SubscriptionStatus::Canceled,
                plan_name: None,
                current_period_end: None,
            },
        ]
    }

    #[test]
    fn choice_by_index_or_id() {
        let booths = booths();
        assert_eq!(parse_booth_choice("1", &booths).as_deref(), Some("B1"));
        assert_eq!(parse_booth_choice(" 2 ", &booths).as_deref(), Some("B2"));
        assert_eq!(parse_booth_choice("B2", &booths).as_deref(), Some("B2"));
        assert_eq!(parse_booth_choice("0", &booths), None);
        assert_eq!(parse_booth_choice("3", &booths), None);
        assert_eq!(parse_booth_choice("", &booths), None);
    }

    #[test]
    fn booth_list_marks_current_selection() {
        let rendered = render_booths(&booths(), Some("B2"));
        assert!(rendered.contains("* 2. Mall (B2) - 无有效订阅"));
        assert!(rendered.contains("  1. Lobby (B1) - 订阅有效"));
    }

    #[test]
    fn conflicts_are_listed_together() {
        let pre_check = PreCheckResult {
            booth_id: "B1".to_string(),
            booth_name: Some("Lobby".to_string()),
            fingerprint_short: None,
            has_valid_subscription: true,
            conflicts: vec![
                Conflict::FingerprintBoundElsewhere {
                    booth_id: "B9".to_string(),
                    booth_name: Some("Old".to_string()),
                    message: None,
                },
                Conflict::BoothHasOtherDeviceData {
                    transaction_count: 5,
                    previous_hardware_id: None,
                    message: None,
                },
            ],
            can_proceed: true,
            message: None,
        };
        let rendered = render_conflicts(&pre_check);
        assert!(rendered.contains("[重新绑定]"));
        assert!(rendered.contains("[清除旧数据]"));
        assert!(rendered.contains("Lobby"));
    }

    #[test]
    fn failure_shows_error_code() {
        let failure = Failure {
            kind: FailureKind::Activation(ActivationErrorCode::BoothNotReady),
            message: "not ready".to_string(),
            recovery: Recovery::RetrySameBooth,
        };
        assert_eq!(
            render_failure(&failure),
            "✗ 激活失败 (BOOTH_NOT_READY): not ready\n"
        );
    }

    mod flow {
        use super::super::*;
        use boothfleet_activation::store::{MemoryCredentialStore, MemorySelectionStore};
        use boothfleet_activation::{ActivationContext, ApiClient, ClientConfig};
        use serde_json::json;
        use std::sync::Arc;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const FP: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

        async fn session(server: &MockServer) -> ScanSession {
            let config = ClientConfig {
                api_url: server.uri(),
                ..Default::default()
            };
            let api = Arc::new(ApiClient::new(&config).unwrap());
            let context = ActivationContext::new(Arc::new(MemorySelectionStore::default()));
            ScanSession::new(api, context, Arc::new(MemoryCredentialStore::new()))
        }

        async fn mount_booths(server: &MockServer) {
            Mock::given(method("GET"))
                .and(path("/payments/subscriptions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    { "booth_id": "B1", "booth_name": "Lobby", "status": "active" }
                ])))
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn scan_select_confirm_and_activate() {
            let server = MockServer::start().await;
            mount_booths(&server).await;
            Mock::given(method("POST"))
                .and(path("/licensing/activate-booth/pre-check"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "booth_id": "B1",
                    "booth_name": "Lobby",
                    "has_valid_subscription": true,
                    "conflicts": [
                        { "type": "booth_has_other_device_data", "transaction_count": 4 }
                    ],
                    "can_proceed": true
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/licensing/activate-booth"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "success": true,
                    "fingerprint_short": "01234567...89abcdef",
                    "license_key": "LK-42"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let mut session = session(&server).await;
            let input = format!("{}\n1\ny\n\n", FP);
            let mut host = TerminalHost::new(input.as_bytes(), Vec::new());

            let outcome = host.run(&mut session).await.unwrap();
            assert_eq!(
                outcome,
                HostOutcome::Activated {
                    booth_id: "B1".to_string()
                }
            );

            let output = String::from_utf8(host.into_output()).unwrap();
            assert!(output.contains("[清除旧数据]"));
            assert!(output.contains("LK-42"));
        }

        #[tokio::test]
        async fn end_of_input_cancels() {
            let server = MockServer::start().await;
            mount_booths(&server).await;

            let mut session = session(&server).await;
            let input = format!("{}\n", FP);
            let mut host = TerminalHost::new(input.as_bytes(), Vec::new());

            let outcome = host.run(&mut session).await.unwrap();
            assert_eq!(outcome, HostOutcome::Cancelled);
            assert_eq!(session.state(), &SessionState::Idle);
        }

        #[tokio::test]
        async fn invalid_payload_is_reported_then_rescanned() {
            let server = MockServer::start().await;
            let mut session = session(&server).await;
            let mut host = TerminalHost::new(&b"not-a-fingerprint\n\nq\n"[..], Vec::new());

            let outcome = host.run(&mut session).await.unwrap();
            assert_eq!(outcome, HostOutcome::Cancelled);

            let output = String::from_utf8(host.into_output()).unwrap();
            assert!(output.contains("✗"));
            assert!(output.contains("按回车重新扫描"));
        }
    }

    /// 写入退出提示时失败的输出
    struct BrokenExitOutput(Vec<u8>);

    impl Write for BrokenExitOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if String::from_utf8_lossy(buf).contains("已退出") {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn quit_reports_output_errors() {
        use boothfleet_activation::store::{MemoryCredentialStore, MemorySelectionStore};
        use boothfleet_activation::{ActivationContext, ApiClient, ClientConfig};
        use std::sync::Arc;

        let api = Arc::new(ApiClient::new(&ClientConfig::default()).unwrap());
        let context = ActivationContext::new(Arc::new(MemorySelectionStore::default()));
        let mut session = ScanSession::new(api, context, Arc::new(MemoryCredentialStore::new()));
        let mut host = TerminalHost::new(&b"q\n"[..], BrokenExitOutput(Vec::new()));

        assert!(host.run(&mut session).await.is_err());
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn quit_and_yes_words() {
        assert!(is_quit(" q "));
        assert!(!is_quit("query"));
        assert!(is_yes("Y"));
        assert!(!is_yes(""));
    }
}
