/// Overlay pass hook
///
/// The renderer opens a dynamic-rendering scope over the forward pass output
/// (load op LOAD, no depth) and hands the open command buffer to an
/// [`OverlayPass`]. What gets drawn, typically a diagnostic GUI, is up to the
/// implementation; the renderer only sets up and closes the pass.

use ash::vk;
use gnve_engine::gnve::frame::{FrameSlotIndex, FrameStats, SwapImageIndex};
use gnve_engine::gnve::Result;

/// Everything an overlay needs to append draws to the current frame
pub struct OverlayFrame<'a> {
    pub device: &'a ash::Device,
    /// Recording, inside a rendering scope targeting the swapchain image
    pub cmd: vk::CommandBuffer,
    /// Frame slot whose resources may be reused once its fence signals
    pub slot: FrameSlotIndex,
    pub image: SwapImageIndex,
    pub extent: vk::Extent2D,
    pub color_format: vk::Format,
    pub stats: &'a FrameStats,
}

/// Collaborator that draws on top of the forward pass
pub trait OverlayPass {
    /// Append draw commands; must not end the rendering scope
    fn record(&mut self, frame: &OverlayFrame<'_>) -> Result<()>;
}

/// Overlay that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOverlay;

impl OverlayPass for NullOverlay {
    fn record(&mut self, _frame: &OverlayFrame<'_>) -> Result<()> {
        Ok(())
    }
}

/// Color attachment of the overlay scope: keep what the forward pass drew
pub fn overlay_color_attachment(view: vk::ImageView) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .load_op(vk::AttachmentLoadOp::LOAD)
        .store_op(vk::AttachmentStoreOp::STORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_preserves_forward_output() {
        let attachment = overlay_color_attachment(vk::ImageView::null());
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.image_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }
}
