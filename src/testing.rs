//! In-memory collaborators for unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc, Weekday};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

use crate::{
    capture::{CaptureContext, CaptureFrame, CaptureMode, DeviceLease},
    clock::Clock,
    collaborators::{
        CaptureDevice, DeviceHandle, RecognitionService, RosterProvider, SessionStore,
        TimetableProvider,
    },
    error::{DeviceError, RecognizeError, RemoteError},
    metrics::MetricsCollector,
    recognition::{
        Aggregator, AttendanceStatus, Recognition, RecognitionPolicy, RosterCell, Subject,
    },
    schedule::{parse_clock_time, ScheduleEntry},
    session::{SessionController, SessionDeps},
};

/// 2024-01-01 is a Monday.
pub fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn entry(course_id: i64, weekday: Weekday, start: &str, end: &str) -> ScheduleEntry {
    ScheduleEntry {
        course_id,
        weekday,
        start_time: parse_clock_time(start).unwrap(),
        end_time: parse_clock_time(end).unwrap(),
        room: Some("B12".into()),
        group_ref: "G1".into(),
        module_ref: format!("Module {course_id}"),
        teacher_ref: "Nadia Benali".into(),
    }
}

pub fn frame() -> CaptureFrame {
    CaptureFrame::new(fake_jpeg(), Utc.with_ymd_and_hms(2024, 1, 1, 14, 5, 0).unwrap())
}

fn fake_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.resize(2048, 0x42);
    bytes
}

/// Shared record of collaborator calls, in call order.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Local time pinned to a set value that then advances with tokio's clock,
/// so paused-time tests see wall time move with their sleeps. Naive values
/// double as UTC.
pub struct ManualClock {
    anchor: Mutex<(NaiveDateTime, tokio::time::Instant)>,
}

impl ManualClock {
    pub fn at(value: &str) -> Self {
        Self {
            anchor: Mutex::new((at(value), tokio::time::Instant::now())),
        }
    }

    pub fn set(&self, value: &str) {
        *self.anchor.lock().unwrap() = (at(value), tokio::time::Instant::now());
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.now_local())
    }

    fn now_local(&self) -> NaiveDateTime {
        let (base, origin) = *self.anchor.lock().unwrap();
        base + chrono::Duration::from_std(origin.elapsed()).unwrap()
    }
}

pub struct FakeDevice {
    journal: Journal,
    acquired: AtomicUsize,
    released: AtomicUsize,
    grabs: AtomicUsize,
    in_use: AtomicBool,
    fail_acquire: AtomicBool,
    failing_grabs: AtomicUsize,
    grab_delay: Mutex<Duration>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::with_journal(Journal::default())
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            grabs: AtomicUsize::new(0),
            in_use: AtomicBool::new(false),
            fail_acquire: AtomicBool::new(false),
            failing_grabs: AtomicUsize::new(0),
            grab_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_grabs(&self, count: usize) {
        self.failing_grabs.store(count, Ordering::SeqCst);
    }

    pub fn set_grab_delay(&self, delay: Duration) {
        *self.grab_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn acquire(&self) -> Result<DeviceHandle, DeviceError> {
        self.journal.push("acquire");
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(DeviceError::Unavailable("camera unplugged".into()));
        }
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::Busy);
        }
        let id = self.acquired.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(DeviceHandle { id })
    }

    async fn grab_frame(&self, _handle: &DeviceHandle) -> Result<Vec<u8>, DeviceError> {
        self.journal.push("grab");
        self.grabs.fetch_add(1, Ordering::SeqCst);

        let delay = *self.grab_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing_grabs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(DeviceError::NotReady("frame too small".into()));
        }
        Ok(fake_jpeg())
    }

    fn release(&self, _handle: DeviceHandle) {
        self.journal.push("release");
        self.released.fetch_add(1, Ordering::SeqCst);
        self.in_use.store(false, Ordering::SeqCst);
    }
}

pub struct FakeStore {
    journal: Journal,
    started: Mutex<Vec<i64>>,
    ended: Mutex<Vec<String>>,
    fail_start: AtomicBool,
    fail_end: AtomicBool,
}

impl FakeStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            started: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
            fail_start: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> Vec<i64> {
        self.started.lock().unwrap().clone()
    }

    pub fn ended(&self) -> Vec<String> {
        self.ended.lock().unwrap().clone()
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_end(&self, fail: bool) {
        self.fail_end.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn start_session(&self, course_id: i64) -> Result<String, RemoteError> {
        self.journal.push(format!("start_session:{course_id}"));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected {
                operation: "start_session",
                status: 500,
                detail: "database locked".into(),
            });
        }
        let mut started = self.started.lock().unwrap();
        started.push(course_id);
        Ok(format!("seance-{}", started.len()))
    }

    async fn end_session(&self, session_id: &str) -> Result<(), RemoteError> {
        self.journal.push(format!("end_session:{session_id}"));
        self.ended.lock().unwrap().push(session_id.to_string());
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(RemoteError::transport("connection reset"));
        }
        Ok(())
    }
}

/// Answers from a queue; an empty queue answers with a miss.
pub struct FakeRecognizer {
    queue: Mutex<VecDeque<Result<Recognition, RecognizeError>>>,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn push_match(&self, subject_id: i64, status: AttendanceStatus, confidence: f32) {
        self.queue.lock().unwrap().push_back(Ok(Recognition {
            subject_id,
            status,
            confidence,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 14, 5, 0).unwrap(),
        }));
    }

    pub fn push_miss(&self, reason: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(RecognizeError::Miss(reason.to_string())));
    }

    pub fn push_remote_error(&self, detail: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(RecognizeError::Remote(RemoteError::transport(detail))));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionService for FakeRecognizer {
    async fn recognize(&self, _session_id: &str, _frame: &[u8]) -> Result<Recognition, RecognizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(RecognizeError::Miss("no face detected".into())))
    }
}

pub struct FakeTimetable {
    entries: Mutex<Vec<ScheduleEntry>>,
    fail: AtomicBool,
}

impl FakeTimetable {
    pub fn with(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set(&self, entries: Vec<ScheduleEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimetableProvider for FakeTimetable {
    async fn list_schedule_entries(&self) -> Result<Vec<ScheduleEntry>, RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Timeout(Duration::from_secs(10)));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

pub struct FakeRoster {
    subjects: Mutex<Vec<Subject>>,
}

impl FakeRoster {
    pub fn with(subjects: Vec<Subject>) -> Self {
        Self {
            subjects: Mutex::new(subjects),
        }
    }

    pub fn set(&self, subjects: Vec<Subject>) {
        *self.subjects.lock().unwrap() = subjects;
    }
}

#[async_trait]
impl RosterProvider for FakeRoster {
    async fn list_subjects(&self) -> Result<Vec<Subject>, RemoteError> {
        Ok(self.subjects.lock().unwrap().clone())
    }
}

/// Every collaborator wired together around one aggregator. The clock starts
/// on Monday 2024-01-01 at 14:05.
pub struct Harness {
    pub journal: Journal,
    pub device: Arc<FakeDevice>,
    pub store: Arc<FakeStore>,
    pub recognizer: Arc<FakeRecognizer>,
    pub clock: Arc<ManualClock>,
    pub metrics: MetricsCollector,
    pub aggregator: Aggregator,
    pub grab_timeout: Duration,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        let device = Arc::new(FakeDevice::with_journal(journal.clone()));
        let store = Arc::new(FakeStore::new(journal.clone()));
        let recognizer = Arc::new(FakeRecognizer::new());
        let clock = Arc::new(ManualClock::at("2024-01-01 14:05:00"));
        let metrics = MetricsCollector::new();
        let aggregator = Aggregator::new(
            recognizer.clone(),
            RosterCell::new(),
            RecognitionPolicy::default(),
            Duration::from_secs(90),
            10,
            metrics.clone(),
            clock.clone(),
        );

        Self {
            journal,
            device,
            store,
            recognizer,
            clock,
            metrics,
            aggregator,
            grab_timeout: Duration::from_secs(10),
        }
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            store: self.store.clone(),
            device: self.device.clone(),
            aggregator: self.aggregator.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
            grab_timeout: self.grab_timeout,
        }
    }

    pub fn controller(&self, mode: CaptureMode) -> SessionController {
        SessionController::new(self.deps(), mode)
    }

    pub fn capture_context(&self, session_id: &str, lease: Arc<DeviceLease>) -> CaptureContext {
        CaptureContext {
            session_id: session_id.to_string(),
            lease,
            aggregator: self.aggregator.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
            grab_timeout: self.grab_timeout,
        }
    }
}

/// One request as seen by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_contains(&self, needle: &[u8]) -> bool {
        self.body.windows(needle.len()).any(|window| window == needle)
    }
}

/// Minimal HTTP server answering every request with the same response and
/// recording what it received.
pub struct HttpStub {
    pub base_url: String,
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl HttpStub {
    pub async fn serve(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let requests = requests.clone();
            async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let body = body.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        requests.lock().unwrap().push(request);

                        let reason = if status == 200 { "OK" } else { "Error" };
                        let head = format!(
                            "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                    });
                }
            }
        });

        Self {
            url: format!("{base_url}/snapshot"),
            base_url,
            requests,
            task,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = raw[head_end + 4..].to_vec();
    while body.len() < length {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => body.extend_from_slice(&buf[..n]),
        }
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}
