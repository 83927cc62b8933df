// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Queries go through `RestrictionsManager`,
// `DevicePolicyManager` and `ActivityManager`; app pinning goes through the
// foreground `Activity`.
//
// ## Architecture notes
//
// A `BroadcastReceiver` cannot be subclassed from native code, so the host
// ships a tiny Java class, `dev.mdmkit.NativeBroadcastReceiver`, with a
// `(long)` constructor and
//
//     private native void nativeOnReceive(long token, Intent intent);
//
// called from `onReceive`. Each registration gets a fresh token; the token
// maps to the notification sink in `RECEIVERS`. Unregistering removes the
// token first, so a broadcast racing the unregister finds nothing and is
// dropped.
//
// `lockApp`/`unlockApp` need the foreground `Activity`. The host reports it
// through `dev.mdmkit.ActivityTracker.nativeOnResume(Activity)` and
// `nativeOnPause()`; without one the calls fail with
// `MdmError::Precondition`.

#![cfg(target_os = "android")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{LazyLock, Mutex, OnceLock};

use jni::objects::{GlobalRef, JClass, JObject, JObjectArray, JString, JValue};
use jni::sys::jlong;
use jni::{JNIEnv, JavaVM};

use mdmkit_core::error::{MdmError, Result};
use mdmkit_core::{ConfigValue, EventKind, LockCapability, ManagedConfig};

use crate::traits::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Host-side receiver class, loaded through the app class loader.
pub const RECEIVER_CLASS: &str = "dev.mdmkit.NativeBroadcastReceiver";

const ACTION_APPLICATION_RESTRICTIONS_CHANGED: &str =
    "android.intent.action.APPLICATION_RESTRICTIONS_CHANGED";
const ACTION_LOCK_TASK_ENTERING: &str = "android.app.action.LOCK_TASK_ENTERING";
const ACTION_LOCK_TASK_EXITING: &str = "android.app.action.LOCK_TASK_EXITING";

const SDK_LOLLIPOP: i32 = 21;
const SDK_MARSHMALLOW: i32 = 23;
const SDK_TIRAMISU: i32 = 33;

/// `ActivityManager.LOCK_TASK_MODE_NONE`
const LOCK_TASK_MODE_NONE: i32 = 0;
/// `Context.RECEIVER_NOT_EXPORTED`
const RECEIVER_NOT_EXPORTED: i32 = 0x4;

/// Room for the local references one bridge call creates.
const LOCAL_FRAME_CAPACITY: i32 = 32;

// ---------------------------------------------------------------------------
// Process-wide state
// ---------------------------------------------------------------------------

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();
static SDK_INT: OnceLock<i32> = OnceLock::new();
static CURRENT_ACTIVITY: Mutex<Option<GlobalRef>> = Mutex::new(None);
static RECEIVERS: LazyLock<Mutex<HashMap<jlong, NotificationSink>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static NEXT_TOKEN: AtomicI64 = AtomicI64::new(1);

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// The process `JavaVM`, taken from the NDK glue on first use.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| MdmError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
///
/// Blocking-pool threads are reused, so they stay attached.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| MdmError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// The application `Context` registered with the NDK glue.
fn app_context() -> jni::errors::Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(jni::errors::Error::NullPtr("Android context"));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting application context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Run `body` inside a local reference frame and translate JNI failures.
///
/// A pending Java exception is logged and cleared before returning so the
/// next JNI call on this thread starts clean.
fn with_env<T>(
    what: &str,
    body: impl FnOnce(&mut JNIEnv) -> jni::errors::Result<T>,
) -> Result<T> {
    let mut env = jni_env()?;
    let out = env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| body(env));
    out.map_err(|e| {
        if env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }
        MdmError::Bridge(format!("{what}: {e}"))
    })
}

fn sdk_int(env: &mut JNIEnv) -> jni::errors::Result<i32> {
    if let Some(sdk) = SDK_INT.get() {
        return Ok(*sdk);
    }
    let sdk = env
        .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
        .i()?;
    Ok(*SDK_INT.get_or_init(|| sdk))
}

/// `context.getSystemService(name)`; null when the service does not exist.
fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
    name: &str,
) -> jni::errors::Result<JObject<'local>> {
    let j_name = env.new_string(name)?;
    env.call_method(
        context,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&j_name)],
    )?
    .l()
}

fn current_activity() -> Result<GlobalRef> {
    CURRENT_ACTIVITY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
        .ok_or_else(|| MdmError::Precondition("no foreground Activity".into()))
}

// ---------------------------------------------------------------------------
// Bundle translation
// ---------------------------------------------------------------------------

/// Flatten a restrictions `Bundle` into scalar values.
fn bundle_to_config(env: &mut JNIEnv, bundle: &JObject) -> jni::errors::Result<ManagedConfig> {
    let key_set = env.call_method(bundle, "keySet", "()Ljava/util/Set;", &[])?.l()?;
    let keys = JObjectArray::from(
        env.call_method(&key_set, "toArray", "()[Ljava/lang/Object;", &[])?
            .l()?,
    );

    // Every per-key reference is freed at the end of its iteration so large
    // bundles stay within the local frame.
    let mut config = ManagedConfig::new();
    for i in 0..env.get_array_length(&keys)? {
        let element = env.get_object_array_element(&keys, i)?;
        let j_key = env.auto_local(JString::from(element));
        let key: String = env.get_string(&j_key)?.into();
        let value = env
            .call_method(
                bundle,
                "get",
                "(Ljava/lang/String;)Ljava/lang/Object;",
                &[JValue::Object(&j_key)],
            )?
            .l()?;
        let value = env.auto_local(value);
        let value = java_to_config_value(env, &value)?;
        config.insert(key, value);
    }
    Ok(config)
}

fn java_to_config_value(env: &mut JNIEnv, value: &JObject) -> jni::errors::Result<ConfigValue> {
    if value.is_null() {
        return Ok(ConfigValue::String(String::new()));
    }
    if env.is_instance_of(value, "java/lang/Boolean")? {
        let b = env.call_method(value, "booleanValue", "()Z", &[])?.z()?;
        return Ok(ConfigValue::Bool(b));
    }
    if env.is_instance_of(value, "java/lang/Number")? {
        let n = env.call_method(value, "doubleValue", "()D", &[])?.d()?;
        return Ok(ConfigValue::Number(n));
    }
    // Strings, string arrays and nested bundles all end up here.
    let text = env
        .call_method(value, "toString", "()Ljava/lang/String;", &[])?
        .l()?;
    let text = env.auto_local(JString::from(text));
    Ok(ConfigValue::String(env.get_string(&text)?.into()))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the MDM platform bridge.
///
/// The struct is zero-sized; process-wide JNI state lives in statics.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI; the first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }
}

// ---------------------------------------------------------------------------
// ManagedConfigStore: android.content.RestrictionsManager
// ---------------------------------------------------------------------------

impl ManagedConfigStore for AndroidBridge {
    fn read_configuration(&self) -> Result<Option<ManagedConfig>> {
        let config = with_env("read application restrictions", |env| {
            if sdk_int(env)? < SDK_LOLLIPOP {
                return Ok(None);
            }
            let context = app_context()?;
            let manager = system_service(env, &context, "restrictions")?;
            if manager.is_null() {
                return Ok(None);
            }
            let bundle = env
                .call_method(&manager, "getApplicationRestrictions", "()Landroid/os/Bundle;", &[])?
                .l()?;
            if bundle.is_null() {
                return Ok(None);
            }
            bundle_to_config(env, &bundle).map(Some)
        })?;

        tracing::debug!(
            keys = config.as_ref().map_or(0, ManagedConfig::len),
            "Android: read application restrictions"
        );
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// LockTaskApi: DevicePolicyManager / ActivityManager / Activity
// ---------------------------------------------------------------------------

impl LockTaskApi for AndroidBridge {
    fn lock_capability(&self) -> LockCapability {
        match with_env("read SDK_INT", |env| sdk_int(env)) {
            Ok(sdk) if sdk >= SDK_LOLLIPOP => LockCapability::Programmatic,
            Ok(_) => LockCapability::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "Android: cannot determine SDK level");
                LockCapability::Unavailable
            }
        }
    }

    fn is_lock_permitted(&self) -> Result<bool> {
        with_env("DevicePolicyManager.isLockTaskPermitted", |env| {
            if sdk_int(env)? < SDK_LOLLIPOP {
                return Ok(false);
            }
            let context = app_context()?;
            let dpm = system_service(env, &context, "device_policy")?;
            if dpm.is_null() {
                return Ok(false);
            }
            let package = env
                .call_method(&context, "getPackageName", "()Ljava/lang/String;", &[])?
                .l()?;
            env.call_method(
                &dpm,
                "isLockTaskPermitted",
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&package)],
            )?
            .z()
        })
    }

    fn is_locked(&self) -> Result<bool> {
        with_env("ActivityManager lock task state", |env| {
            let sdk = sdk_int(env)?;
            if sdk < SDK_LOLLIPOP {
                return Ok(false);
            }
            let context = app_context()?;
            let am = system_service(env, &context, "activity")?;
            if am.is_null() {
                return Ok(false);
            }
            if sdk >= SDK_MARSHMALLOW {
                let mode = env.call_method(&am, "getLockTaskModeState", "()I", &[])?.i()?;
                Ok(mode != LOCK_TASK_MODE_NONE)
            } else {
                env.call_method(&am, "isInLockTaskMode", "()Z", &[])?.z()
            }
        })
    }

    fn start_lock_task(&self) -> Result<()> {
        let activity = current_activity()
            .inspect_err(|_| tracing::warn!("Android: unable to lock app, Activity is null"))?;
        with_env("Activity.startLockTask", |env| {
            env.call_method(activity.as_obj(), "startLockTask", "()V", &[])?;
            Ok(())
        })?;
        tracing::info!("Android: lock task started");
        Ok(())
    }

    fn stop_lock_task(&self) -> Result<()> {
        let activity = current_activity()
            .inspect_err(|_| tracing::warn!("Android: unable to unlock app, Activity is null"))?;
        with_env("Activity.stopLockTask", |env| {
            env.call_method(activity.as_obj(), "stopLockTask", "()V", &[])?;
            Ok(())
        })?;
        tracing::info!("Android: lock task stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObserverRegistrar: Context.registerReceiver
// ---------------------------------------------------------------------------

fn actions_for(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::ConfigurationChanged => &[ACTION_APPLICATION_RESTRICTIONS_CHANGED],
        EventKind::LockStatusChanged => &[ACTION_LOCK_TASK_ENTERING, ACTION_LOCK_TASK_EXITING],
    }
}

/// Load the host receiver class through the app class loader; `FindClass`
/// on a natively attached thread only sees the system loader.
fn receiver_class<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject,
) -> jni::errors::Result<JClass<'local>> {
    let loader = env
        .call_method(context, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])?
        .l()?;
    let j_name = env.new_string(RECEIVER_CLASS)?;
    let class = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&j_name)],
        )?
        .l()?;
    Ok(JClass::from(class))
}

fn register_receiver(kind: EventKind, token: jlong) -> Result<GlobalRef> {
    with_env("Context.registerReceiver", |env| {
        let context = app_context()?;
        let class = receiver_class(env, &context)?;
        let receiver = env.new_object(&class, "(J)V", &[JValue::Long(token)])?;

        let filter = env.new_object("android/content/IntentFilter", "()V", &[])?;
        for action in actions_for(kind) {
            let j_action = env.new_string(action)?;
            env.call_method(
                &filter,
                "addAction",
                "(Ljava/lang/String;)V",
                &[JValue::Object(&j_action)],
            )?;
        }

        if sdk_int(env)? >= SDK_TIRAMISU {
            env.call_method(
                &context,
                "registerReceiver",
                "(Landroid/content/BroadcastReceiver;Landroid/content/IntentFilter;I)Landroid/content/Intent;",
                &[
                    JValue::Object(&receiver),
                    JValue::Object(&filter),
                    JValue::Int(RECEIVER_NOT_EXPORTED),
                ],
            )?;
        } else {
            env.call_method(
                &context,
                "registerReceiver",
                "(Landroid/content/BroadcastReceiver;Landroid/content/IntentFilter;)Landroid/content/Intent;",
                &[JValue::Object(&receiver), JValue::Object(&filter)],
            )?;
        }

        env.new_global_ref(receiver)
    })
}

impl ObserverRegistrar for AndroidBridge {
    fn register_observer(
        &self,
        kind: EventKind,
        sink: NotificationSink,
    ) -> Result<Box<dyn ObserverHandle>> {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        RECEIVERS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token, sink);

        match register_receiver(kind, token) {
            Ok(receiver) => {
                tracing::info!(kind = %kind, token, "Android: broadcast receiver registered");
                Ok(Box::new(AndroidObserverHandle { token, receiver }))
            }
            Err(e) => {
                forget_token(token);
                Err(MdmError::ObserverRegistration(e.to_string()))
            }
        }
    }
}

fn forget_token(token: jlong) {
    RECEIVERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&token);
}

/// A registered `NativeBroadcastReceiver` instance.
struct AndroidObserverHandle {
    token: jlong,
    receiver: GlobalRef,
}

impl ObserverHandle for AndroidObserverHandle {
    fn unregister(self: Box<Self>) -> Result<()> {
        forget_token(self.token);
        with_env("Context.unregisterReceiver", |env| {
            let context = app_context()?;
            env.call_method(
                &context,
                "unregisterReceiver",
                "(Landroid/content/BroadcastReceiver;)V",
                &[JValue::Object(self.receiver.as_obj())],
            )?;
            Ok(())
        })
        .map_err(|e| MdmError::ObserverRegistration(e.to_string()))?;
        tracing::info!(token = self.token, "Android: broadcast receiver unregistered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Native entry points called from the host Java classes
// ---------------------------------------------------------------------------

/// `NativeBroadcastReceiver.nativeOnReceive(long token, Intent intent)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_dev_mdmkit_NativeBroadcastReceiver_nativeOnReceive(
    _env: JNIEnv,
    _this: JObject,
    token: jlong,
    _intent: JObject,
) {
    let sink = RECEIVERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&token)
        .cloned();
    match sink {
        Some(sink) => sink(),
        None => tracing::debug!(token, "Android: broadcast for released receiver dropped"),
    }
}

/// `ActivityTracker.nativeOnResume(Activity activity)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_dev_mdmkit_ActivityTracker_nativeOnResume(
    env: JNIEnv,
    _class: JClass,
    activity: JObject,
) {
    match env.new_global_ref(&activity) {
        Ok(global) => {
            *CURRENT_ACTIVITY
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(global);
            tracing::debug!("Android: foreground Activity set");
        }
        Err(e) => tracing::error!(error = %e, "Android: cannot retain foreground Activity"),
    }
}

/// `ActivityTracker.nativeOnPause()`
#[unsafe(no_mangle)]
pub extern "system" fn Java_dev_mdmkit_ActivityTracker_nativeOnPause(_env: JNIEnv, _class: JClass) {
    CURRENT_ACTIVITY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    tracing::debug!("Android: foreground Activity cleared");
}
