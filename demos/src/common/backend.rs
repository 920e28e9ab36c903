//! Backend selection for the DepthNet tools.
//!
//! `cuda` wins over `wgpu`; without either the tools run on the CPU. The
//! BLAS and fusion features only change the reported name.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        /// Selected backend type
        pub type SelectedBackend = Cuda<f32>;
        /// Selected device type
        pub type SelectedDevice = CudaDevice;

        pub fn create_device() -> SelectedDevice {
            CudaDevice::default()
        }

        const BASE_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        /// Selected backend type
        pub type SelectedBackend = Wgpu<f32>;
        /// Selected device type
        pub type SelectedDevice = WgpuDevice;

        pub fn create_device() -> SelectedDevice {
            WgpuDevice::default()
        }

        const BASE_NAME: &str = "WGPU (GPU)";
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        /// Selected backend type. Depth regression and the pretrained
        /// encoder weights are both `f32`.
        pub type SelectedBackend = NdArray<f32>;
        /// Selected device type
        pub type SelectedDevice = NdArrayDevice;

        pub fn create_device() -> SelectedDevice {
            NdArrayDevice::default()
        }

        #[cfg(any(feature = "blas-netlib", feature = "openblas", feature = "openblas-system"))]
        const BASE_NAME: &str = "NdArray (CPU, BLAS)";
        #[cfg(not(any(feature = "blas-netlib", feature = "openblas", feature = "openblas-system")))]
        const BASE_NAME: &str = "NdArray (CPU)";
    }
}

/// Human readable name of the compiled-in backend, logged at startup.
pub fn get_backend_name() -> String {
    if cfg!(feature = "fusion") && (cfg!(feature = "cuda") || cfg!(feature = "wgpu")) {
        format!("{BASE_NAME} + fusion")
    } else {
        BASE_NAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;

    #[test]
    fn selected_backend_runs_on_created_device() {
        let device = create_device();
        let x = Tensor::<SelectedBackend, 4>::ones([1, 1, 2, 2], &device);

        assert_eq!(x.sum().into_scalar(), 4.0);
    }

    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    #[test]
    fn cpu_backend_name() {
        assert!(get_backend_name().starts_with("NdArray (CPU"));
    }
}
