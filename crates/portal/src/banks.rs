use std::time::Duration;

use crate::adapter::{
    vars, ChallengeKind, ChallengeSpec, ExportSpec, FallbackSpec, FallbackStage, LoginSpec,
    PollingSpec, PortalAdapter, Prompt, RequestSpec, Step,
};
use crate::forms::FormSelector;
use crate::predicate::{Contains, Lacks};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:68.0) Gecko/20100101 Firefox/68.0";

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_ATTEMPTS: u32 = 15;

const LOGIN_KEY: &str = "login_key";
const PIN: &str = "pin";
const OTP: &str = "otp";

// ── Fineco ────────────────────────────────────────────────────────────────────

const FINECO_LOGIN: &str = "https://finecobank.com/portalelogin";
const FINECO_MOVEMENTS: &str = "https://finecobank.com/conto-e-carte/movimenti/movimenti-conto";
const FINECO_CONSENT_CONFIRM: &str = "https://finecobank.com/myfineco-auth/sca/consents/confirm";
const FINECO_OFFLINE_OVERLAY: &str =
    "https://finecobank.com/myfineco-auth/overlays/ovl-transazione?isOtpInOverlay=true";
const FINECO_OFFLINE_CONFIRM: &str =
    "https://finecobank.com/myfineco-auth/sca/consents/conferma-transazione-offline";
const FINECO_EXPORT: &str = "https://finecobank.com/conto-e-carte/movimenti/movimenti-conto/excel";
const FINECO_LOGOUT: &str = "https://finecobank.com/public/logout";

const FINECO_CONFIRMED: &str = r#""stato":"confirmed""#;

pub fn fineco() -> PortalAdapter {
    PortalAdapter {
        name: "Fineco",
        user_agent: USER_AGENT,
        xhr_headers: vec![
            ("Referer", FINECO_MOVEMENTS),
            ("X-Requested-With", "XMLHttpRequest"),
        ],
        date_format: "%d/%m/%Y",
        login: LoginSpec {
            steps: vec![
                Step::Send(RequestSpec::get(FINECO_LOGIN)),
                Step::Submit {
                    form: FormSelector::Index(0),
                    fields: vec![("LOGIN", "{username}"), ("PASSWD", "{password}")],
                },
            ],
            accepted: Box::new(Lacks(r#"name="PASSWD""#)),
        },
        challenge: ChallengeSpec {
            steps: vec![
                Step::Send(
                    RequestSpec::get("https://finecobank.com/myfineco-auth/sca/consents?r=rmvc")
                        .query("_", "{now_ms}")
                        .xhr(),
                ),
                Step::Send(
                    RequestSpec::post(
                        "https://finecobank.com/myfineco-auth/sca/consents/inizia-transazione",
                    )
                    .xhr(),
                ),
            ],
        },
        polling: PollingSpec {
            status: RequestSpec::post(
                "https://finecobank.com/myfineco-auth/sca/consents/verifica-stato-transazione",
            )
            .xhr(),
            confirmed: Box::new(Contains(FINECO_CONFIRMED)),
            interval: POLL_INTERVAL,
            max_attempts: POLL_ATTEMPTS,
            on_confirmed: Vec::new(),
        },
        fallback: Some(FallbackSpec {
            kind: ChallengeKind::ManualPinOtp,
            notice: "App authorization failed, use PIN and mobile generated code",
            stages: vec![
                FallbackStage {
                    name: "PIN",
                    prompt: Prompt {
                        label: "Insert PIN",
                        var: PIN,
                        masked: true,
                    },
                    steps: vec![
                        Step::Send(RequestSpec::get(FINECO_OFFLINE_OVERLAY)),
                        Step::Submit {
                            form: FormSelector::Name("pinOfflineForm"),
                            fields: vec![("PIN", "{pin}")],
                        },
                    ],
                    success: Box::new(Contains(r#""PIN":"OK""#)),
                },
                FallbackStage {
                    name: "mobile code",
                    prompt: Prompt {
                        label: "Insert generated code",
                        var: OTP,
                        masked: false,
                    },
                    steps: vec![Step::Send(
                        RequestSpec::post(FINECO_OFFLINE_CONFIRM).body("PIN", "{otp}").xhr(),
                    )],
                    success: Box::new(Contains(FINECO_CONFIRMED)),
                },
            ],
        }),
        confirm: vec![Step::Send(RequestSpec::post(FINECO_CONSENT_CONFIRM).xhr())],
        export: ExportSpec {
            // The search form has to be submitted once before it accepts a
            // custom period.
            prepare: vec![
                Step::Send(RequestSpec::get(FINECO_MOVEMENTS)),
                Step::Submit {
                    form: FormSelector::Name("frmKeywordSearch"),
                    fields: Vec::new(),
                },
                Step::Submit {
                    form: FormSelector::Name("frmKeywordSearch"),
                    fields: vec![("dataDal", "{start}"), ("dataAl", "{end}")],
                },
            ],
            download: RequestSpec::get(FINECO_EXPORT),
        },
        logout: RequestSpec::get(FINECO_LOGOUT),
    }
}

// ── Webank ────────────────────────────────────────────────────────────────────

const WEBANK_LOGIN: &str = "https://www.webank.it/webankpub/wbresp/home.do";
const WEBANK_LOGIN_KEY: &str = "https://www.webank.it/WEBWB/jsp/ht/loginKey.jsp";
const WEBANK_SET_OTP_MODE: &str = "https://www.webank.it/WEBWB/cambioStatoOperazioneDaAutorizzare.do";
const WEBANK_CHECK_OTP_MODE: &str = "https://www.webank.it/WEBWB/statoOperazioneDaAutorizzare.do";
const WEBANK_MAIN: &str = "https://www.webank.it/WEBWB/homepage.do";
const WEBANK_STATEMENTS: &str = "https://www.webank.it/WEBWB/cc/movimentiConto.xls";
const WEBANK_LOGOUT: &str = "https://www.webank.it/WEBWB/logout.do";

/// The home page carries the authorization form second.
const WEBANK_MAIN_FORM: FormSelector = FormSelector::Index(1);

pub fn webank() -> PortalAdapter {
    let check_status = || RequestSpec::get(WEBANK_CHECK_OTP_MODE).query("hashOtp", "{token}");

    PortalAdapter {
        name: "Webank",
        user_agent: USER_AGENT,
        xhr_headers: Vec::new(),
        date_format: "%d/%m/%Y",
        login: LoginSpec {
            steps: vec![
                Step::Send(RequestSpec::get(WEBANK_LOGIN)),
                Step::Capture {
                    request: RequestSpec::get(WEBANK_LOGIN_KEY),
                    var: LOGIN_KEY,
                },
                Step::Send(RequestSpec::get(WEBANK_LOGIN)),
                Step::Submit {
                    form: FormSelector::Name("toplogin"),
                    fields: vec![
                        ("j_password", "{password}"),
                        ("j_username", "{username}"),
                        ("loginKey", "{login_key}"),
                    ],
                },
            ],
            accepted: Box::new(Lacks(r#"name="j_password""#)),
        },
        challenge: ChallengeSpec {
            steps: vec![Step::ReadField {
                form: FormSelector::Id("otpLoginEsito"),
                field: "hashOtp",
                var: vars::TOKEN,
            }],
        },
        polling: PollingSpec {
            status: check_status(),
            confirmed: Box::new(Contains(r#""esito" : "VP""#)),
            interval: POLL_INTERVAL,
            max_attempts: POLL_ATTEMPTS,
            on_confirmed: vec![
                Step::Send(RequestSpec::get(WEBANK_MAIN)),
                Step::Submit {
                    form: WEBANK_MAIN_FORM,
                    fields: Vec::new(),
                },
            ],
        },
        fallback: Some(FallbackSpec {
            kind: ChallengeKind::ManualOtp,
            notice: "App authorization failed, use generated OTP code",
            stages: vec![FallbackStage {
                name: "OTP",
                prompt: Prompt {
                    label: "Insert OTP Code",
                    var: OTP,
                    masked: false,
                },
                steps: vec![
                    Step::Send(RequestSpec::get(WEBANK_SET_OTP_MODE).query("hashOtp", "{token}")),
                    Step::Send(check_status()),
                    Step::Send(RequestSpec::get(WEBANK_MAIN)),
                    Step::Submit {
                        form: WEBANK_MAIN_FORM,
                        fields: vec![("codiceOTP", "{otp}")],
                    },
                ],
                success: Box::new(Lacks("Codice errore:")),
            }],
        }),
        confirm: Vec::new(),
        export: ExportSpec {
            prepare: Vec::new(),
            download: RequestSpec::get(WEBANK_STATEMENTS)
                .query("tipoIntervallo", "periodo")
                .query("dataInizio", "{start}")
                .query("dataFine", "{end}")
                .query("ultimiMovimenti", "400"),
        },
        logout: RequestSpec::get(WEBANK_LOGOUT),
    }
}
