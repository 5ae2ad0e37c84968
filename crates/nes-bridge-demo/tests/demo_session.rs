//! End-to-end sessions against the demo engine with real files on disk.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use ctor::ctor;
use nes_bridge::{
    Bridge, BridgeConfig, BridgeError, CheatError, ControllerDevice, EngineError, FavoredRegion,
    InputMask, Region, StartError, VIDEO_BUFFER_LEN,
};
use nes_bridge_demo::{BATTERY_RAM_LEN, DemoEngine};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

const BATTERY: u8 = 0x02;
const PAL: u8 = 0x01;
const DUAL: u8 = 0x01;

fn scratch_dir(name: &str) -> anyhow::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("nes_bridge_demo_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn write_ines(dir: &Path, name: &str, flags6: u8, flags9: u8, flags10: u8) -> anyhow::Result<PathBuf> {
    let mut image = vec![0u8; 16 + 0x4000];
    image[..4].copy_from_slice(b"NES\x1A");
    image[4] = 1;
    image[6] = flags6;
    image[9] = flags9;
    image[10] = flags10;
    let path = dir.join(name);
    fs::write(&path, image)?;
    Ok(path)
}

fn battery_after(frames: u64) -> Vec<u8> {
    let mut battery = vec![0u8; BATTERY_RAM_LEN];
    battery[..8].copy_from_slice(&frames.to_le_bytes());
    battery
}

#[test]
fn ntsc_session_hands_full_frames_to_host() -> anyhow::Result<()> {
    let dir = scratch_dir("ntsc")?;
    let rom = write_ines(&dir, "ntsc.nes", 0, 0, 0)?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();

    let sizes: Arc<Mutex<Vec<(&str, usize)>>> = Arc::default();
    let video_sizes = Arc::clone(&sizes);
    let audio_sizes = Arc::clone(&sizes);
    bridge.set_video_callback(Some(Box::new(move |pixels: &[u8]| {
        video_sizes.lock().unwrap().push(("video", pixels.len()));
    })));
    bridge.set_audio_callback(Some(Box::new(move |samples: &[u8]| {
        audio_sizes.lock().unwrap().push(("audio", samples.len()));
    })));

    bridge.start(&rom)?;
    bridge.run_frame();
    bridge.run_frame();

    assert_eq!(bridge.region(), Region::Ntsc);
    assert_eq!(bridge.frame_duration(), 1.0 / 60.0);
    assert_eq!(
        *sizes.lock().unwrap(),
        [
            ("video", VIDEO_BUFFER_LEN),
            ("audio", 735 * 2),
            ("video", VIDEO_BUFFER_LEN),
            ("audio", 735 * 2),
        ]
    );
    assert_eq!(VIDEO_BUFFER_LEN, 256 * 240 * 2);

    let engine = bridge.engine();
    assert!(engine.is_powered());
    assert_eq!(engine.port(0), Some(ControllerDevice::Pad(0)));
    assert_eq!(engine.audio_settings().map(|audio| audio.volume), Some(100));
    assert_eq!(engine.machine().frame, 2);
    Ok(())
}

#[test]
fn pal_session_runs_at_fifty_hertz() -> anyhow::Result<()> {
    let dir = scratch_dir("pal")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();

    bridge.start(write_ines(&dir, "pal.nes", 0, PAL, 0)?)?;
    bridge.run_frame();

    assert_eq!(bridge.region(), Region::Pal);
    assert_eq!(bridge.frame_duration(), 1.0 / 50.0);
    assert_eq!(bridge.audio_buffer().len(), 882);
    assert!(bridge.audio_buffer().iter().any(|&sample| sample != 0));

    let mut dual: Bridge<DemoEngine> =
        Bridge::with_config(BridgeConfig::default().with_favored_region(FavoredRegion::Pal));
    dual.start(write_ines(&dir, "dual.nes", 0, 0, DUAL)?)?;
    assert_eq!(dual.region(), Region::Pal);
    Ok(())
}

#[test]
fn held_buttons_reach_the_engine() -> anyhow::Result<()> {
    let dir = scratch_dir("input")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();
    bridge.start(write_ines(&dir, "game.nes", 0, 0, 0)?)?;

    bridge.activate_input((InputMask::A | InputMask::UP).bits(), 0);
    bridge.activate_input(InputMask::B.bits(), 1);
    bridge.run_frame();
    assert_eq!(bridge.engine().machine().last_input, 0x11);

    bridge.deactivate_input(InputMask::A.bits(), 0);
    bridge.run_frame();
    assert_eq!(bridge.engine().machine().last_input, 0x10);

    bridge.reset_inputs();
    bridge.run_frame();
    assert_eq!(bridge.engine().machine().last_input, 0);
    Ok(())
}

#[test]
fn forced_flush_is_invisible_to_the_running_game() -> anyhow::Result<()> {
    let dir = scratch_dir("flush")?;
    let rom = write_ines(&dir, "zelda.nes", BATTERY, 0, 0)?;
    let destination = dir.join("zelda.sav");

    let mut flushed: Bridge<DemoEngine> = Bridge::default();
    let mut reference: Bridge<DemoEngine> = Bridge::default();
    for bridge in [&mut flushed, &mut reference] {
        bridge.start(&rom)?;
        bridge.activate_input(InputMask::A.bits(), 0);
        for _ in 0..10 {
            bridge.run_frame();
        }
    }

    flushed.save_game_save(&destination)?;

    assert_eq!(fs::read(&destination)?, battery_after(10));
    assert!(!dir.join("zelda.sav.temp").exists());
    assert_eq!(
        flushed.save_state_to_memory()?,
        reference.save_state_to_memory()?
    );

    flushed.run_frame();
    reference.run_frame();
    assert_eq!(flushed.video_buffer(), reference.video_buffer());
    assert_eq!(flushed.audio_buffer(), reference.audio_buffer());
    assert_eq!(flushed.engine().machine(), reference.engine().machine());
    Ok(())
}

#[test]
fn flushed_game_save_loads_into_a_new_session() -> anyhow::Result<()> {
    let dir = scratch_dir("reload")?;
    let rom = write_ines(&dir, "metroid.nes", BATTERY, 0, 0)?;
    let save = dir.join("metroid.sav");

    let mut first: Bridge<DemoEngine> = Bridge::default();
    first.start(&rom)?;
    for _ in 0..4 {
        first.run_frame();
    }
    first.save_game_save(&save)?;
    first.stop();

    let mut second: Bridge<DemoEngine> = Bridge::default();
    second.start(&rom)?;
    assert_eq!(second.engine().machine().battery, vec![0u8; BATTERY_RAM_LEN]);

    second.load_game_save(&save)?;
    assert_eq!(second.engine().machine().battery, battery_after(4));
    assert_eq!(second.engine().machine().frame, 0);

    // A later restart with nothing pending starts from a blank cartridge and
    // leaves the file alone.
    second.start(&rom)?;
    assert_eq!(second.engine().machine().battery, vec![0u8; BATTERY_RAM_LEN]);
    assert_eq!(fs::read(&save)?, battery_after(4));
    Ok(())
}

#[test]
fn missing_game_save_is_reported() -> anyhow::Result<()> {
    let dir = scratch_dir("missing_save")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();

    assert!(matches!(
        bridge.load_game_save(dir.join("none.sav")),
        Err(BridgeError::NoSession)
    ));

    bridge.start(write_ines(&dir, "game.nes", BATTERY, 0, 0)?)?;
    assert!(matches!(
        bridge.load_game_save(dir.join("none.sav")),
        Err(BridgeError::Storage { .. })
    ));
    assert!(bridge.is_loaded());
    Ok(())
}

#[test]
fn stop_without_destination_notifies_host() -> anyhow::Result<()> {
    let dir = scratch_dir("notify")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    bridge.set_save_callback(Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    bridge.start(write_ines(&dir, "plain.nes", 0, 0, 0)?)?;
    bridge.stop();
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    bridge.start(write_ines(&dir, "battery.nes", BATTERY, 0, 0)?)?;
    bridge.run_frame();
    bridge.stop();
    bridge.stop();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(bridge.video_buffer().iter().all(|&byte| byte == 0));
    Ok(())
}

#[test]
fn cheats_patch_the_picture_until_reset() -> anyhow::Result<()> {
    let dir = scratch_dir("cheats")?;
    let rom = write_ines(&dir, "game.nes", 0, 0, 0)?;

    let mut patched: Bridge<DemoEngine> = Bridge::default();
    let mut plain: Bridge<DemoEngine> = Bridge::default();
    patched.start(&rom)?;
    plain.start(&rom)?;

    assert!(matches!(
        patched.add_cheat_code("NOTACODE!"),
        Err(CheatError::DecodeFailed(_))
    ));
    assert_eq!(patched.cheat_count(), 0);
    patched.add_cheat_code("SXIOPO")?;
    patched.add_cheat_code("ZEXPYGLA")?;
    assert_eq!(patched.cheat_count(), 2);

    patched.run_frame();
    plain.run_frame();
    assert_ne!(patched.video_buffer(), plain.video_buffer());

    patched.reset_cheats();
    assert_eq!(patched.cheat_count(), 0);
    patched.run_frame();
    plain.run_frame();
    assert_eq!(patched.video_buffer(), plain.video_buffer());
    Ok(())
}

#[test]
fn foreign_images_are_rejected() -> anyhow::Result<()> {
    let dir = scratch_dir("foreign")?;
    let rom = dir.join("readme.txt");
    fs::write(&rom, b"not a cartridge")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();

    match bridge.start(&rom) {
        Err(StartError::LoadFailed(code)) => assert_eq!(code, EngineError::CORRUPT_FILE),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!bridge.is_loaded());
    assert_eq!(bridge.frame_duration(), 1.0 / 60.0);
    Ok(())
}

#[test]
fn database_is_handed_to_the_engine() -> anyhow::Result<()> {
    let dir = scratch_dir("database")?;
    let database = dir.join("NstDatabase.xml");
    fs::write(&database, "<game crc=\"1\"/>\n\n<game crc=\"2\"/>\n")?;
    let mut bridge: Bridge<DemoEngine> = Bridge::default();

    bridge.initialize(&database)?;
    assert_eq!(bridge.engine().database_entries(), 2);
    assert_eq!(bridge.database(), Some(database.as_path()));
    Ok(())
}

#[test]
fn save_state_files_rewind_the_machine() -> anyhow::Result<()> {
    let dir = scratch_dir("states")?;
    let slot = dir.join("slot0.state");
    let mut bridge: Bridge<DemoEngine> = Bridge::default();
    bridge.start(write_ines(&dir, "game.nes", BATTERY, 0, 0)?)?;

    for _ in 0..3 {
        bridge.run_frame();
    }
    bridge.save_state(&slot)?;
    let video = bridge.video_buffer().to_vec();
    for _ in 0..5 {
        bridge.run_frame();
    }
    bridge.load_state(&slot)?;
    assert_eq!(bridge.engine().machine().frame, 3);
    assert_eq!(bridge.engine().machine().battery, battery_after(3));

    fs::write(&slot, b"garbage")?;
    assert!(matches!(
        bridge.load_state(&slot),
        Err(BridgeError::SaveState { .. })
    ));
    assert_eq!(bridge.engine().machine().frame, 3);
    assert_eq!(video.len(), VIDEO_BUFFER_LEN);
    Ok(())
}

#[test]
fn oversized_volume_plays_at_full_scale() -> anyhow::Result<()> {
    let dir = scratch_dir("volume")?;
    let config = BridgeConfig {
        volume: u32::MAX,
        ..BridgeConfig::default()
    };
    let mut loud: Bridge<DemoEngine> = Bridge::with_config(config);
    let mut full: Bridge<DemoEngine> = Bridge::default();
    let rom = write_ines(&dir, "game.nes", 0, 0, 0)?;

    loud.start(&rom)?;
    full.start(&rom)?;
    loud.run_frame();
    full.run_frame();

    assert_eq!(loud.audio_buffer(), full.audio_buffer());
    Ok(())
}

#[test]
fn bridge_config_survives_postcard() -> anyhow::Result<()> {
    let config = BridgeConfig::default()
        .with_sample_rate(48_000)
        .with_volume(85)
        .with_favored_region(FavoredRegion::Famicom)
        .with_temp_state_suffix(".flush");

    let blob = postcard::to_stdvec(&config)?;
    let decoded: BridgeConfig = postcard::from_bytes(&blob)?;

    assert_eq!(decoded, config);
    assert_eq!(decoded.favored_region.region(), Region::Ntsc);
    Ok(())
}
