// Presenter - owns the whole device/presentation stack
//
// Teardown runs strictly in reverse construction order:
//   image views -> swapchain -> logical device -> surface -> instance -> window
//
// The chain and device are released explicitly in Drop; surface, context and
// window follow in field declaration order.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use super::context::{DrawableSize, GraphicsContext, PresentationSurface};
use super::device::SelectedDevice;
use super::error::Result;
use super::physical::select_device;
use super::swapchain::PresentationChain;

pub struct Presenter<C, S, W>
where
    C: GraphicsContext,
    S: PresentationSurface,
    W: DrawableSize,
{
    chain: Option<PresentationChain<C::Device>>,
    device: ManuallyDrop<Arc<SelectedDevice<C::Device>>>,
    // Order matters for drop!
    surface: S,
    context: C,
    window: W,
}

impl<C, S, W> Presenter<C, S, W>
where
    C: GraphicsContext,
    S: PresentationSurface,
    W: DrawableSize,
{
    /// Select a device, create it, and build the first presentation chain.
    ///
    /// On failure everything created so far is released before returning.
    /// (Parameters drop in reverse order: surface, context, window.)
    pub fn new(window: W, context: C, surface: S) -> Result<Self> {
        let selection = select_device(&context, &surface)?;
        let device = SelectedDevice::create(&context, selection)?;

        let mut presenter = Self {
            chain: None,
            device: ManuallyDrop::new(Arc::new(device)),
            surface,
            context,
            window,
        };
        presenter.rebuild_chain()?;

        Ok(presenter)
    }

    /// Replace the presentation chain, e.g. after a resize or when the
    /// presentation engine reports the chain out of date.
    ///
    /// The old chain is destroyed before the new one is created; support
    /// and drawable size are queried fresh.
    pub fn rebuild_chain(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.destroy_chain();

        let device: &Arc<SelectedDevice<C::Device>> = &self.device;
        let chain = PresentationChain::build(device, &self.surface, &self.window)?;
        self.chain = Some(chain);
        Ok(())
    }

    /// Destroy the current chain, if any (e.g. while minimized). Waits for
    /// the device to go idle first so no submitted work still uses the views.
    pub fn release_chain(&mut self) {
        if self.chain.is_none() {
            return;
        }
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device wait before releasing chain failed: {}", e);
        }
        self.destroy_chain();
    }

    /// Caller must have waited for the device to go idle.
    fn destroy_chain(&mut self) {
        if let Some(chain) = self.chain.take() {
            log::info!("Destroying presentation chain...");
            drop(chain);
        }
    }

    pub fn chain(&self) -> Option<&PresentationChain<C::Device>> {
        self.chain.as_ref()
    }

    /// The device is lent out by reference only, so it cannot be kept
    /// alive past the surface and context it was created from.
    pub fn device(&self) -> &SelectedDevice<C::Device> {
        &self.device
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

impl<C, S, W> Drop for Presenter<C, S, W>
where
    C: GraphicsContext,
    S: PresentationSurface,
    W: DrawableSize,
{
    fn drop(&mut self) {
        log::info!("Cleaning up presentation stack...");

        let _ = self.device.wait_idle();
        self.destroy_chain();

        // SAFETY: the field is not touched again after this point.
        unsafe { ManuallyDrop::drop(&mut self.device) };
    }
}
