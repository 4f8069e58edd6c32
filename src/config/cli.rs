use crate::domain::model::{
    AvailabilityStatus, RegistrationDetails, RegistrationForm, DEFAULT_LOCATION,
};
use crate::domain::request::{Decision, ServiceDetailsForm};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "medmarket")]
#[command(about = "Client for the medical services marketplace")]
pub struct CliArgs {
    /// TOML 設定檔，未指定時使用預設值
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override backend.base_url")]
    pub base_url: Option<String>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 以 email / 密碼登入並保存 credential
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    RegisterCompany(RegisterCompanyArgs),
    RegisterProfessional(RegisterProfessionalArgs),
    RegisterSupplier(RegisterSupplierArgs),
    Whoami,
    Logout,
    Dashboard,
    /// 列出專業人員
    Professionals,
    /// 公司向專業人員送出服務請求
    Request {
        professional_id: String,
        #[arg(long)]
        service_type: String,
        #[arg(long)]
        message: String,
    },
    /// 專業人員核准或拒絕收到的請求
    Decide {
        request_id: String,
        #[arg(help = "approve | reject")]
        decision: Decision,
    },
    /// 查詢請求目前的流程階段
    Status { request_id: String },
    /// 模擬付款，款項由平台保管
    Pay { request_id: String, amount: f64 },
    Details(DetailsArgs),
    /// 查看專業人員聯絡資料（公司需有核准的請求）
    Contact { professional_id: String },
    Review {
        professional_id: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: String,
        #[arg(long)]
        collaboration_type: Option<String>,
    },
    Availability {
        #[arg(help = "available | busy | unavailable")]
        status: AvailabilityStatus,
    },
    Notifications,
}

#[derive(Debug, Clone, Args)]
pub struct AccountArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    #[arg(long)]
    pub full_name: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long, default_value = DEFAULT_LOCATION)]
    pub location: String,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterCompanyArgs {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long)]
    pub company_name: String,
    #[arg(long, help = "e.g. hospital, clinic")]
    pub company_type: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub size: String,
    #[arg(long, value_delimiter = ',')]
    pub services_offered: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterProfessionalArgs {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long, value_delimiter = ',')]
    pub specialties: Vec<String>,
    #[arg(long, default_value = "0")]
    pub experience_years: u32,
    #[arg(long)]
    pub hourly_rate: Option<f64>,
    #[arg(long, default_value = "")]
    pub bio: String,
    #[arg(long, default_value = "")]
    pub education: String,
    #[arg(long, value_delimiter = ',')]
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterSupplierArgs {
    #[command(flatten)]
    pub account: AccountArgs,
    #[arg(long)]
    pub company_name: String,
    #[arg(long, value_delimiter = ',')]
    pub products_services: Vec<String>,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Clone, Args)]
pub struct DetailsArgs {
    pub request_id: String,
    #[arg(long)]
    pub date_time: String,
    #[arg(long)]
    pub location: String,
    #[arg(long)]
    pub surgeon_name: String,
    #[arg(long)]
    pub operating_room: String,
    #[arg(long)]
    pub access_authorization: String,
    #[arg(long)]
    pub estimated_duration: String,
    #[arg(long)]
    pub notes: Option<String>,
}

impl AccountArgs {
    fn into_form(self, details: RegistrationDetails) -> RegistrationForm {
        RegistrationForm {
            email: self.email,
            password: self.password,
            full_name: self.full_name,
            phone: self.phone,
            location: self.location,
            details,
        }
    }
}

impl From<RegisterCompanyArgs> for RegistrationForm {
    fn from(args: RegisterCompanyArgs) -> Self {
        args.account.into_form(RegistrationDetails::Company {
            company_name: args.company_name,
            company_type: args.company_type,
            description: args.description,
            size: args.size,
            services_offered: args.services_offered,
            requirements: Vec::new(),
        })
    }
}

impl From<RegisterProfessionalArgs> for RegistrationForm {
    fn from(args: RegisterProfessionalArgs) -> Self {
        args.account.into_form(RegistrationDetails::Professional {
            specialties: args.specialties,
            experience_years: args.experience_years,
            hourly_rate: args.hourly_rate,
            bio: args.bio,
            education: args.education,
            certifications: args.certifications,
            skills: Vec::new(),
            areas_of_expertise: Vec::new(),
        })
    }
}

impl From<RegisterSupplierArgs> for RegistrationForm {
    fn from(args: RegisterSupplierArgs) -> Self {
        args.account.into_form(RegistrationDetails::Supplier {
            company_name: args.company_name,
            products_services: args.products_services,
            description: args.description,
            certifications: Vec::new(),
        })
    }
}

impl DetailsArgs {
    pub fn split(self) -> (String, ServiceDetailsForm) {
        let form = ServiceDetailsForm {
            date_time: self.date_time,
            location: self.location,
            access_authorization: self.access_authorization,
            surgeon_name: self.surgeon_name,
            operating_room: self.operating_room,
            estimated_duration: self.estimated_duration,
            additional_notes: self.notes,
        };
        (self.request_id, form)
    }
}

impl Command {
    /// 需要已登入帳號的子命令
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. }
                | Command::RegisterCompany(_)
                | Command::RegisterProfessional(_)
                | Command::RegisterSupplier(_)
                | Command::Logout
                | Command::Professionals
        )
    }
}
