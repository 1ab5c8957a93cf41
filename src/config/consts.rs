// src/config/consts.rs

// Page contract
pub const LISTING_TESTID: &str = "studies-list";
pub const ITEM_TAG: &str = "li";
pub const ITEM_CLASS: &str = "list-item";
pub const TESTID_ATTR: &str = "data-testid";
pub const TITLE_TESTID: &str = "title";
pub const HOST_TESTID: &str = "host";
pub const REWARD_TESTID: &str = "study-tag-reward";
pub const REWARD_PER_HOUR_TESTID: &str = "study-tag-reward-per-hour";
pub const TIME_TESTID: &str = "study-tag-completion-time";
pub const STUDY_URL_PREFIX: &str = "https://app.prolific.com/studies/";
pub const LISTING_URL: &str = "https://app.prolific.com/";

// Local store
pub const STORE_DIR: &str = ".store";
pub const SYNC_FILE: &str = "sync.json";
pub const LOCAL_FILE: &str = "local.json";
pub const LOG_FILE: &str = "debug.log";
/// Page snapshot written by the browser bridge.
pub const SNAPSHOT_FILE: &str = "page.html";

// Persisted keys (local scope)
pub const CURRENT_STUDIES: &str = "currentStudies";
pub const STUDY_HISTORY: &str = "studyHistory";
pub const EXCHANGE_RATES: &str = "exchangeRates";
pub const LAST_RATE_UPDATE: &str = "lastRateUpdate";
pub const COUNTER: &str = "counter";

// Settings keys the core writes (sync scope)
pub const AUTO_REFRESH_ENABLED: &str = "autoRefreshEnabled";

// Retention
pub const NUMBER_OF_STUDIES_TO_STORE: usize = 100;
pub const HISTORY_CAP: usize = 500;

// Exchange rates
pub const RATES_URL: &str = "https://open.er-api.com/v6/latest/GBP";
pub const RATE_TTL_HOURS: i64 = 24;
pub const RATE_CHECK_SECS: u64 = 3600;
pub const HTTP_TIMEOUT_SECS: u64 = 15;

// Watcher
pub const CONTAINER_RETRY_MS: u64 = 500;
pub const DEFAULT_REFRESH_SECS: u64 = 60;

// Notifications
pub const NOTIFY_GAP_MS: u64 = 1000;
pub const NOTIFY_TITLE: &str = "Prolific Automatic Studies";
pub const NOTIFY_MESSAGE: &str = "A new study is available on Prolific!";
pub const DEFAULT_AUDIO: &str = "alert1.mp3";
