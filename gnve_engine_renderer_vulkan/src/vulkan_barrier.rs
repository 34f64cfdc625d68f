/// Image layout transitions with explicit stage/access scopes
///
/// Every transition the renderer records is listed here, so the
/// synchronization scopes can be checked without a device.

use ash::vk;

/// Source and destination synchronization scope of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierScope {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

/// Layout transitions used by uploads and frame recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTransition {
    /// Freshly acquired swapchain image, about to be cleared and drawn
    ColorToAttachment,
    /// Shared depth image, about to be cleared; earlier frames may still write it
    DepthToAttachment,
    /// Forward pass output, loaded again by the overlay scope
    AttachmentToOverlay,
    /// Finished color image handed to the presentation engine
    ColorToPresent,
    /// New texture image, about to receive staging copies
    UploadToTransferDst,
    /// Fully copied texture image, sampled by fragment shaders from now on
    TransferDstToShaderRead,
}

impl ImageTransition {
    pub const ALL: [ImageTransition; 6] = [
        ImageTransition::ColorToAttachment,
        ImageTransition::DepthToAttachment,
        ImageTransition::AttachmentToOverlay,
        ImageTransition::ColorToPresent,
        ImageTransition::UploadToTransferDst,
        ImageTransition::TransferDstToShaderRead,
    ];

    /// (old, new) layout pair
    pub fn layouts(self) -> (vk::ImageLayout, vk::ImageLayout) {
        match self {
            ImageTransition::ColorToAttachment => {
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            }
            ImageTransition::DepthToAttachment => {
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            }
            ImageTransition::AttachmentToOverlay => {
                (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            }
            ImageTransition::ColorToPresent => {
                (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR)
            }
            ImageTransition::UploadToTransferDst => {
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            }
            ImageTransition::TransferDstToShaderRead => {
                (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            }
        }
    }

    pub fn scope(self) -> BarrierScope {
        match self {
            // Chained to the acquire semaphore wait at COLOR_ATTACHMENT_OUTPUT
            ImageTransition::ColorToAttachment => BarrierScope {
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::NONE,
                dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            },
            // One depth image serves every frame in flight
            ImageTransition::DepthToAttachment => BarrierScope {
                src_stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                dst_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            },
            // Rendering scopes do not order against each other on their own
            ImageTransition::AttachmentToOverlay => BarrierScope {
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            },
            ImageTransition::ColorToPresent => BarrierScope {
                src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                dst_access: vk::AccessFlags2::NONE,
            },
            ImageTransition::UploadToTransferDst => BarrierScope {
                src_stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
                src_access: vk::AccessFlags2::NONE,
                dst_stage: vk::PipelineStageFlags2::COPY,
                dst_access: vk::AccessFlags2::TRANSFER_WRITE,
            },
            ImageTransition::TransferDstToShaderRead => BarrierScope {
                src_stage: vk::PipelineStageFlags2::COPY,
                src_access: vk::AccessFlags2::TRANSFER_WRITE,
                dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
                dst_access: vk::AccessFlags2::SHADER_SAMPLED_READ,
            },
        }
    }

    /// Default aspect; combined depth/stencil images override it with their full range
    pub fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            ImageTransition::DepthToAttachment => vk::ImageAspectFlags::DEPTH,
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    /// Barrier for `image`, covering `mip_levels` levels of layer 0
    pub fn barrier(self, image: vk::Image, mip_levels: u32) -> vk::ImageMemoryBarrier2<'static> {
        let (old_layout, new_layout) = self.layouts();
        let scope = self.scope();
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(scope.src_stage)
            .src_access_mask(scope.src_access)
            .dst_stage_mask(scope.dst_stage)
            .dst_access_mask(scope.dst_access)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect(),
                base_mip_level: 0,
                level_count: mip_levels.max(1),
                base_array_layer: 0,
                layer_count: 1,
            })
    }
}

/// Record a batch of transitions as one dependency
///
/// # Safety
///
/// `cmd` must be in the recording state and every image must be alive.
pub unsafe fn record_transitions(device: &ash::Device, cmd: vk::CommandBuffer, barriers: &[vk::ImageMemoryBarrier2<'_>]) {
    let dependency = vk::DependencyInfo::default().image_memory_barriers(barriers);
    device.cmd_pipeline_barrier2(cmd, &dependency);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_out_of_undefined_have_no_source_access() {
        for transition in ImageTransition::ALL {
            let (old, _) = transition.layouts();
            if old == vk::ImageLayout::UNDEFINED && transition != ImageTransition::DepthToAttachment {
                assert_eq!(transition.scope().src_access, vk::AccessFlags2::NONE, "{:?}", transition);
            }
        }
    }

    #[test]
    fn test_every_transition_waits_on_a_destination_stage() {
        for transition in ImageTransition::ALL {
            assert!(!transition.scope().dst_stage.is_empty(), "{:?}", transition);
            assert!(!transition.scope().src_stage.is_empty(), "{:?}", transition);
        }
    }

    #[test]
    fn test_depth_transition_orders_against_previous_depth_writes() {
        let scope = ImageTransition::DepthToAttachment.scope();
        assert!(scope.src_access.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert!(scope.src_stage.contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert_eq!(ImageTransition::DepthToAttachment.aspect(), vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_color_attachment_chains_to_acquire_wait_stage() {
        let scope = ImageTransition::ColorToAttachment.scope();
        assert_eq!(scope.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert!(scope.dst_access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_overlay_load_waits_for_forward_writes() {
        let (old, new) = ImageTransition::AttachmentToOverlay.layouts();
        assert_eq!(old, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(new, old);

        let scope = ImageTransition::AttachmentToOverlay.scope();
        assert_eq!(scope.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(scope.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(scope.dst_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert!(scope.dst_access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_READ));
        assert!(scope.dst_access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));
        assert!(ImageTransition::ALL.contains(&ImageTransition::AttachmentToOverlay));
    }

    #[test]
    fn test_present_transition_publishes_color_writes() {
        let (old, new) = ImageTransition::ColorToPresent.layouts();
        assert_eq!(old, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(new, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(
            ImageTransition::ColorToPresent.scope().src_access,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
        );
    }

    #[test]
    fn test_upload_chain_is_contiguous() {
        let (_, after_first) = ImageTransition::UploadToTransferDst.layouts();
        let (before_second, last) = ImageTransition::TransferDstToShaderRead.layouts();
        assert_eq!(after_first, before_second);
        assert_eq!(last, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(
            ImageTransition::UploadToTransferDst.scope().dst_access,
            ImageTransition::TransferDstToShaderRead.scope().src_access
        );
    }

    #[test]
    fn test_barrier_covers_requested_mip_levels() {
        let barrier = ImageTransition::TransferDstToShaderRead.barrier(vk::Image::null(), 9);
        assert_eq!(barrier.subresource_range.level_count, 9);
        assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        let single = ImageTransition::ColorToAttachment.barrier(vk::Image::null(), 0);
        assert_eq!(single.subresource_range.level_count, 1);
    }
}
