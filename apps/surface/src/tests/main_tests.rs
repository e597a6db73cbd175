use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use register::{LoopbackHub, LoopbackRegister, RegisterKey, RegisterSubscription, SharedRegister};
use shared::domain::{Presentation, Slide, SlideId};
use storage::MemoryContentStore;

use super::*;

const PRESENTATION: PresentationId = PresentationId(3);

/// Loopback register whose writes start failing once `fail_writes` is set.
struct FlakyRegister {
    inner: LoopbackRegister,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl SharedRegister for FlakyRegister {
    fn origin(&self) -> &str {
        self.inner.origin()
    }

    async fn write(&self, presentation_id: PresentationId, key: RegisterKey, payload: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.write(presentation_id, key, payload).await
    }

    async fn read(&self, presentation_id: PresentationId, key: RegisterKey) -> Result<Option<String>> {
        self.inner.read(presentation_id, key).await
    }

    fn subscribe(&self, presentation_id: PresentationId, key: RegisterKey) -> RegisterSubscription {
        self.inner.subscribe(presentation_id, key)
    }
}

async fn flaky_core(role: SurfaceRole) -> (SurfaceCore<OutlineRenderer>, Arc<AtomicBool>) {
    let content = Arc::new(MemoryContentStore::new());
    content
        .insert(Presentation {
            id: PRESENTATION,
            name: "rehearsal".into(),
            slides: (1..=3)
                .map(|id| Slide {
                    id: SlideId(id),
                    background: "#101010".into(),
                    elements: Vec::new(),
                    notes: String::new(),
                })
                .collect(),
            rotation_groups: Vec::new(),
        })
        .await;

    let fail_writes = Arc::new(AtomicBool::new(false));
    let register = FlakyRegister {
        inner: LoopbackHub::new().attach(role.as_str()),
        fail_writes: fail_writes.clone(),
    };
    let channels = SyncChannels::new(Arc::new(register), PRESENTATION);
    let core = SurfaceCore::open(role, channels, content, OutlineRenderer, Viewport::design())
        .await
        .expect("open surface");
    (core, fail_writes)
}

fn typed(lines: &'static str) -> Lines<BufReader<&'static [u8]>> {
    BufReader::new(lines.as_bytes()).lines()
}

#[tokio::test]
async fn control_loop_survives_failed_register_writes() {
    let (core, fail_writes) = flaky_core(SurfaceRole::Control).await;
    let surface = ControlSurface::new(core).await;
    fail_writes.store(true, Ordering::SeqCst);

    run_control(surface, typed("stop\nopen-output\nstatus\nquit\n"))
        .await
        .expect("control surface keeps running after write failures");
}

#[tokio::test]
async fn presenter_loop_survives_failed_rotation_stop() {
    let (core, fail_writes) = flaky_core(SurfaceRole::Presenter).await;
    let surface = PresenterSurface::new(core);
    fail_writes.store(true, Ordering::SeqCst);

    run_presenter(surface, typed("stop\ntimer pause\nquit\n"))
        .await
        .expect("presenter surface keeps running after write failures");
}
