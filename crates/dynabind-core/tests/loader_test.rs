//! System Loader Tests
//!
//! Exercises the libloading-backed loader through the public API:
//! - Files that exist but are not loadable images
//! - A real system library opened, bound, called and closed
//! - Configuration discovery failures

use std::sync::Arc;

use dynabind_core::platform::library_extension;
use dynabind_core::prelude::*;
use dynabind_core::{DylibLoader, LibraryRegistry, NativeLoader};

type TickFn = extern "C" fn();

#[test]
fn test_garbage_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("corrupt.{}", library_extension()));
    std::fs::write(&path, b"\x7fELF but not really").unwrap();

    let registry = LibraryRegistry::system().with_search_paths(vec![dir.path().to_path_buf()]);
    match registry.get_or_load("corrupt") {
        Err(BindError::LibraryLoadError { library, path: attempted, source }) => {
            assert_eq!(library, "corrupt");
            assert_eq!(attempted, path);
            assert!(!source.message.is_empty());
        }
        other => panic!("expected LibraryLoadError, got {:?}", other),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_controller_aborts_on_unloadable_library() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(format!("engine.{}", library_extension())), b"nope").unwrap();

    let tick = Arc::new(NativeFn::<TickFn>::new());
    let source = StaticSource::new().with_module(
        BindingModule::new("game.engine").with_type(
            BindingType::new("Engine")
                .library("engine")
                .field(FieldBinding::new("Tick", "engine_tick", NativeSignature::of::<TickFn>(), tick.clone())),
        ),
    );
    let controller = LifecycleController::new(source);
    let config = BindConfig::new(dir.path(), vec![".".into()]).with_prefixes(vec!["game.".to_string()]);

    assert!(matches!(
        controller.initialize(&config),
        Err(BindError::LibraryLoadError { .. })
    ));
    assert_eq!(controller.state(), LifecycleState::Uninitialized);
    assert!(!tick.is_bound());
}

#[test]
fn test_config_file_missing_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let controller = LifecycleController::new(StaticSource::new());

    let provider = ConfigFile(dir.path().join("dynabind.toml"));
    assert!(matches!(
        controller.initialize(&provider),
        Err(BindError::ConfigurationMissing(_))
    ));
}

#[test]
fn test_config_file_drives_search_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("plugins")).unwrap();
    let config_path = dir.path().join("dynabind.toml");
    std::fs::write(
        &config_path,
        "[native]\nsearch_paths = [\"plugins\", \"lib\"]\nmodule_prefixes = [\"game.\"]\n",
    )
    .unwrap();

    let controller = LifecycleController::new(StaticSource::new());
    let report = controller.initialize(&ConfigFile(config_path)).unwrap().unwrap();

    assert_eq!(report.slots, 0);
    assert_eq!(controller.state(), LifecycleState::Initialized);
    assert_eq!(
        controller.registry().search_paths(),
        vec![dir.path().join("plugins"), dir.path().join("lib")]
    );
}

#[test]
fn test_dylib_open_missing_file() {
    let loader = DylibLoader::new();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join(format!("absent.{}", library_extension()));
    assert!(loader.open(&missing).is_err());
}

#[cfg(target_os = "linux")]
type AbsFn = extern "C" fn(i32) -> i32;

/// Link the system C library into `dir` as `c.so`, if one can be found.
#[cfg(target_os = "linux")]
fn link_libc(dir: &std::path::Path) -> Option<std::path::PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/lib/x86_64-linux-gnu/libc.so.6",
        "/usr/lib/x86_64-linux-gnu/libc.so.6",
        "/lib/aarch64-linux-gnu/libc.so.6",
        "/usr/lib/aarch64-linux-gnu/libc.so.6",
        "/usr/lib64/libc.so.6",
        "/lib64/libc.so.6",
        "/usr/lib/libc.so.6",
        "/lib/libc.so.6",
    ];

    let target = CANDIDATES.iter().map(std::path::Path::new).find(|p| p.is_file())?;
    let link = dir.join(format!("c.{}", library_extension()));
    std::os::unix::fs::symlink(target, &link).ok()?;
    Some(link)
}

#[cfg(target_os = "linux")]
#[test]
fn test_dylib_open_resolve_close() {
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = link_libc(dir.path()) else {
        eprintln!("no system libc found, skipping");
        return;
    };

    let loader = DylibLoader::new();
    let library = loader.open(&path).unwrap();

    let abs = loader.find_symbol(&library, "abs").unwrap();
    assert!(!abs.is_null());
    let missing = loader.find_symbol(&library, "dynabind_no_such_symbol").unwrap_err();
    assert!(missing.message.contains("dynabind_no_such_symbol"));
    assert_eq!(missing.code, None);

    loader.close(library).unwrap();
}

#[cfg(target_os = "linux")]
#[test]
fn test_system_library_binds_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let Some(path) = link_libc(dir.path()) else {
        eprintln!("no system libc found, skipping");
        return;
    };

    let abs = Arc::new(NativeFn::<AbsFn>::new());
    let source = StaticSource::new().with_module(
        BindingModule::new("sys.libc").with_type(
            BindingType::new("LibC")
                .library("c")
                .field(FieldBinding::new("Abs", "abs", NativeSignature::of::<AbsFn>(), abs.clone())),
        ),
    );
    let controller = LifecycleController::new(source);
    let config = BindConfig::new(dir.path(), vec![".".into()]);

    let report = controller.initialize(&config).unwrap().unwrap();
    assert_eq!(report.slots, 1);
    assert_eq!(report.libraries, vec!["c".to_string()]);

    let loaded = controller.registry().loaded_libraries();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].path, path);
    assert_eq!(loaded[0].bound_slots, 1);

    let f = abs.get().expect("Abs should be bound");
    assert_eq!(f(-7), 7);
    assert_eq!(f(42), 42);

    controller.handle_signal(LifecycleSignal::Shutdown).unwrap();
    assert!(!abs.is_bound());
    assert!(controller.registry().is_empty());
    assert_eq!(controller.state(), LifecycleState::TornDown);
}
