//! Image Adapter - 流式图像渲染服务

mod image_store;
mod swarm_client;

pub use image_store::ImageStore;
pub use swarm_client::{collect_images, SwarmClientConfig, SwarmImageClient};
