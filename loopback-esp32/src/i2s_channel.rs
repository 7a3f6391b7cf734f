//! ESP-IDF I2S standard-mode channel driver.
//!
//! Opens one I2S controller per role in master mode with an MSB slot layout
//! and drives it through the blocking `i2s_channel_read`/`i2s_channel_write`
//! calls. Each channel owns its `i2s_chan_handle_t` and disables and deletes
//! it on drop.

use std::ptr;
use std::time::Duration;

use esp_idf_sys::{self as sys, esp, EspError};

use loopback_core::models::audio_models::{ChannelRole, ChannelSpec, SlotMode};

use crate::slot_layout::{MsbSlotLayout, SlotMask};
use loopback_core::models::error::{AllocationStage, LoopbackError, TransferKind};
use loopback_core::traits::audio_channel::{AudioChannel, ChannelDriver};

const TARGET: &str = "loopback::i2s";

/// `I2S_GPIO_UNUSED`.
const GPIO_UNUSED: sys::gpio_num_t = sys::gpio_num_t_GPIO_NUM_NC;

/// Channel driver backed by the ESP-IDF I2S standard-mode API.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspI2sDriver;

impl EspI2sDriver {
    pub fn new() -> Self {
        Self
    }
}

impl ChannelDriver for EspI2sDriver {
    type Channel = I2sChannel;

    /// Sequence:
    /// 1. `i2s_new_channel` (master, DMA geometry from the spec)
    /// 2. `i2s_channel_init_std_mode` (clock, MSB slot, GPIO)
    /// 3. `i2s_channel_enable`
    fn open(&self, spec: &ChannelSpec) -> Result<I2sChannel, LoopbackError> {
        let role = spec.role;
        let chan_cfg = channel_config(spec);

        let mut handle: sys::i2s_chan_handle_t = ptr::null_mut();
        let (tx, rx): (*mut sys::i2s_chan_handle_t, *mut sys::i2s_chan_handle_t) = match role {
            ChannelRole::Playback => (&mut handle, ptr::null_mut()),
            ChannelRole::Capture => (ptr::null_mut(), &mut handle),
        };

        esp!(unsafe { sys::i2s_new_channel(&chan_cfg, tx, rx) })
            .map_err(|e| allocation_error(role, AllocationStage::Create, e))?;
        log::info!(target: TARGET, "{} channel created on I2S{}", role, spec.port);

        // From here on, an early return drops `channel` and deletes the handle.
        let mut channel = I2sChannel {
            handle,
            spec: spec.clone(),
            enabled: false,
        };

        let std_cfg = std_config(spec);
        esp!(unsafe { sys::i2s_channel_init_std_mode(channel.handle, &std_cfg) })
            .map_err(|e| allocation_error(role, AllocationStage::ConfigureStdMode, e))?;

        esp!(unsafe { sys::i2s_channel_enable(channel.handle) })
            .map_err(|e| allocation_error(role, AllocationStage::Enable, e))?;
        channel.enabled = true;

        log::info!(
            target: TARGET,
            "{} channel enabled: {} Hz, {} bit, {:?}",
            role, spec.sample_rate, spec.bit_width, spec.slot_mode
        );
        Ok(channel)
    }
}

/// An enabled I2S channel.
pub struct I2sChannel {
    handle: sys::i2s_chan_handle_t,
    spec: ChannelSpec,
    enabled: bool,
}

// SAFETY: the I2S driver serialises access to a channel internally. The
// service performs transfers from the loop thread only and drops the channel
// on the control thread after that loop has been joined.
unsafe impl Send for I2sChannel {}
unsafe impl Sync for I2sChannel {}

impl AudioChannel for I2sChannel {
    fn spec(&self) -> &ChannelSpec {
        &self.spec
    }

    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, LoopbackError> {
        let mut bytes_read: usize = 0;
        let code = unsafe {
            sys::i2s_channel_read(
                self.handle,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut bytes_read,
                timeout_ms(timeout),
            )
        };
        transfer_result(self.spec.role, code).map(|()| bytes_read)
    }

    fn write(&self, buf: &[u8], timeout: Duration) -> Result<usize, LoopbackError> {
        let mut bytes_written: usize = 0;
        let code = unsafe {
            sys::i2s_channel_write(
                self.handle,
                buf.as_ptr().cast(),
                buf.len(),
                &mut bytes_written,
                timeout_ms(timeout),
            )
        };
        transfer_result(self.spec.role, code).map(|()| bytes_written)
    }
}

impl Drop for I2sChannel {
    fn drop(&mut self) {
        unsafe {
            if self.enabled {
                if let Err(e) = esp!(sys::i2s_channel_disable(self.handle)) {
                    log::warn!(target: TARGET, "Failed to disable {} channel: {}", self.spec.role, e);
                }
            }
            if let Err(e) = esp!(sys::i2s_del_channel(self.handle)) {
                log::error!(target: TARGET, "Failed to delete {} channel: {}", self.spec.role, e);
                return;
            }
        }
        log::info!(target: TARGET, "{} channel deleted", self.spec.role);
    }
}

fn channel_config(spec: &ChannelSpec) -> sys::i2s_chan_config_t {
    let mut cfg = sys::i2s_chan_config_t {
        id: spec.port as sys::i2s_port_t,
        role: sys::i2s_role_t_I2S_ROLE_MASTER,
        dma_desc_num: spec.dma_desc_count,
        dma_frame_num: spec.dma_frame_count,
        ..Default::default()
    };
    cfg.__bindgen_anon_1.auto_clear = spec.auto_clear;
    cfg
}

/// Equivalent of `I2S_STD_CLK_DEFAULT_CONFIG` + `I2S_STD_MSB_SLOT_DEFAULT_CONFIG`.
fn std_config(spec: &ChannelSpec) -> sys::i2s_std_config_t {
    let slot_mode = match spec.slot_mode {
        SlotMode::Mono => sys::i2s_slot_mode_t_I2S_SLOT_MODE_MONO,
        SlotMode::Stereo => sys::i2s_slot_mode_t_I2S_SLOT_MODE_STEREO,
    };
    let layout = MsbSlotLayout::for_target(spec.slot_mode, spec.bit_width);
    let slot_mask = match layout.mask {
        SlotMask::Left => sys::i2s_std_slot_mask_t_I2S_STD_SLOT_LEFT,
        SlotMask::Both => sys::i2s_std_slot_mask_t_I2S_STD_SLOT_BOTH,
    };

    let (dout, din) = match spec.role {
        ChannelRole::Capture => (GPIO_UNUSED, spec.pins.data as sys::gpio_num_t),
        ChannelRole::Playback => (spec.pins.data as sys::gpio_num_t, GPIO_UNUSED),
    };

    sys::i2s_std_config_t {
        clk_cfg: sys::i2s_std_clk_config_t {
            sample_rate_hz: spec.sample_rate,
            clk_src: sys::soc_periph_i2s_clk_src_t_I2S_CLK_SRC_DEFAULT,
            mclk_multiple: sys::i2s_mclk_multiple_t_I2S_MCLK_MULTIPLE_256,
            ..Default::default()
        },
        slot_cfg: sys::i2s_std_slot_config_t {
            // Data bit width enum values equal the bit count.
            data_bit_width: spec.bit_width as sys::i2s_data_bit_width_t,
            slot_bit_width: sys::i2s_slot_bit_width_t_I2S_SLOT_BIT_WIDTH_AUTO,
            slot_mode,
            slot_mask,
            ws_width: spec.bit_width as u32,
            ws_pol: false,
            bit_shift: false,
            #[cfg(esp32)]
            msb_right: layout.msb_right,
            #[cfg(not(esp32))]
            left_align: true,
            #[cfg(not(esp32))]
            big_endian: false,
            #[cfg(not(esp32))]
            bit_order_lsb: false,
            ..Default::default()
        },
        gpio_cfg: sys::i2s_std_gpio_config_t {
            mclk: GPIO_UNUSED,
            bclk: spec.pins.bclk as sys::gpio_num_t,
            ws: spec.pins.ws as sys::gpio_num_t,
            dout,
            din,
            invert_flags: Default::default(),
        },
    }
}

fn timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn allocation_error(role: ChannelRole, stage: AllocationStage, e: EspError) -> LoopbackError {
    log::error!(target: TARGET, "Failed to {} {} channel: {}", stage, role, e);
    LoopbackError::ChannelAllocation {
        role,
        stage,
        code: e.code(),
    }
}

fn transfer_result(role: ChannelRole, code: sys::esp_err_t) -> Result<(), LoopbackError> {
    if code == sys::ESP_OK as sys::esp_err_t {
        return Ok(());
    }
    let kind = if code == sys::ESP_ERR_TIMEOUT as sys::esp_err_t {
        TransferKind::Timeout
    } else {
        TransferKind::Io
    };
    Err(LoopbackError::Transfer { role, kind, code })
}
