//! Opaque driver object handles.
//!
//! Handles are plain ids issued by a driver. They carry no ownership: the
//! backend that created an object is responsible for destroying it.

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u64);

            impl $name {
                /// Wrap a raw driver id.
                #[inline]
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// The raw driver id.
                #[inline]
                pub const fn as_raw(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

define_handle! {
    /// A command queue (Metal-style).
    QueueId;
    /// A command pool that owns reusable command buffers.
    CommandPoolId;
    /// A command buffer.
    CommandBufferId;
    /// GPU-to-CPU synchronization object.
    FenceId;
    /// GPU-to-GPU synchronization object.
    SemaphoreId;
    /// A presentation surface created from a window handle.
    SurfaceId;
    /// A swapchain of presentable images.
    SwapchainId;
    /// A presentation layer attached to a window (Metal-style).
    LayerId;
    /// A drawable vended by a presentation layer.
    DrawableId;
}
